//! Permission & bot-button catalog
//!
//! Static tables of every permission id and every bot button the system
//! recognizes. Role and account grants are validated against these tables and
//! wildcards expand to them at resolution time.

use serde::Serialize;
use std::collections::HashSet;

/// Marker used in persisted grants and request payloads for "everything".
pub const WILDCARD: &str = "*";

/// The one button every resolved user gets.
pub const HOME_BUTTON: &str = "common.home";

const BUILTIN_PERMISSIONS: &[(&str, &str)] = &[
    ("dashboard", "Dashboard"),
    ("employees", "Employees"),
    ("payouts", "Payouts"),
    ("payouts-manage-dates", "Payouts: change dates and backdate"),
    ("payouts-control", "Payout control"),
    ("incentives", "Penalties and bonuses"),
    ("reports", "Reports"),
    ("broadcast", "Broadcast"),
    ("messages", "Message history"),
    ("dictionary", "Dictionary"),
    ("settings", "Settings"),
    ("vacations", "Vacations"),
    ("birthdays", "Birthdays"),
    ("assets", "Assets"),
    ("access", "Access control"),
];

const BUILTIN_BUTTONS: &[(&str, &str, ButtonScope)] = &[
    ("user.view_salary", "📄 View salary", ButtonScope::User),
    ("user.request_payout", "💰 Request payout", ButtonScope::User),
    ("user.view_schedule", "📅 View schedule", ButtonScope::User),
    ("user.profile", "👤 Personal cabinet", ButtonScope::User),
    (HOME_BUTTON, "🏠 Home", ButtonScope::Common),
];

/// Buttons granted to accounts that have neither a role nor their own button list.
pub const DEFAULT_USER_BUTTONS: &[&str] = &[
    "user.view_salary",
    "user.request_payout",
    "user.view_schedule",
    "user.profile",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDef {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonScope {
    /// Always available, never role-gated
    Common,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotButtonDef {
    pub id: String,
    pub label: String,
    pub scope: ButtonScope,
    /// Keyboard text shown in the bot
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fixed: bool,
}

/// Read-only after construction; shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Catalog {
    permissions: Vec<PermissionDef>,
    bot_buttons: Vec<BotButtonDef>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let permissions = BUILTIN_PERMISSIONS
            .iter()
            .map(|(id, label)| PermissionDef {
                id: id.to_string(),
                label: label.to_string(),
            })
            .collect();

        let bot_buttons = BUILTIN_BUTTONS
            .iter()
            .map(|(id, text, scope)| BotButtonDef {
                id: id.to_string(),
                label: text.to_string(),
                scope: *scope,
                text: text.to_string(),
                fixed: *id == HOME_BUTTON,
            })
            .collect();

        Self {
            permissions,
            bot_buttons,
        }
    }

    /// Adds a permission id; used when a deployment ships extra modules.
    pub fn with_permission(mut self, id: &str, label: &str) -> Self {
        if !self.is_permission(id) {
            self.permissions.push(PermissionDef {
                id: id.to_string(),
                label: label.to_string(),
            });
        }
        self
    }

    pub fn with_button(mut self, id: &str, text: &str, scope: ButtonScope) -> Self {
        if !self.is_button(id) {
            self.bot_buttons.push(BotButtonDef {
                id: id.to_string(),
                label: text.to_string(),
                scope,
                text: text.to_string(),
                fixed: false,
            });
        }
        self
    }

    pub fn permissions(&self) -> &[PermissionDef] {
        &self.permissions
    }

    pub fn bot_buttons(&self) -> &[BotButtonDef] {
        &self.bot_buttons
    }

    pub fn permission_ids(&self) -> Vec<String> {
        self.permissions.iter().map(|p| p.id.clone()).collect()
    }

    /// Every button outside the common scope; what a button wildcard expands to.
    pub fn gated_button_ids(&self) -> Vec<String> {
        self.bot_buttons
            .iter()
            .filter(|b| b.scope != ButtonScope::Common)
            .map(|b| b.id.clone())
            .collect()
    }

    pub fn is_permission(&self, id: &str) -> bool {
        self.permissions.iter().any(|p| p.id == id)
    }

    pub fn is_button(&self, id: &str) -> bool {
        self.bot_buttons.iter().any(|b| b.id == id)
    }

    pub fn button(&self, id: &str) -> Option<&BotButtonDef> {
        self.bot_buttons.iter().find(|b| b.id == id)
    }

    pub fn default_user_buttons(&self) -> Vec<String> {
        DEFAULT_USER_BUTTONS.iter().map(|s| s.to_string()).collect()
    }

    /// Display labels for the given ids, de-duplicated in first-seen order.
    pub fn button_labels<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        self.map_buttons(ids, |b| &b.label)
    }

    /// Keyboard texts for the given ids, de-duplicated in first-seen order.
    pub fn button_texts<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        self.map_buttons(ids, |b| &b.text)
    }

    fn map_buttons<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a String>,
        field: impl Fn(&BotButtonDef) -> &String,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        ids.into_iter()
            .filter_map(|id| self.button(id))
            .map(|b| field(b).clone())
            .filter(|value| seen.insert(value.clone()))
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
