//! Role, account and resolved-user models

use crate::catalog::WILDCARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A set of catalog ids, or everything the catalog contains at resolution time.
///
/// Persisted and exchanged as a JSON list; a list containing `"*"` is `All`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Grant {
    All,
    Only(Vec<String>),
}

impl Grant {
    pub fn none() -> Self {
        Grant::Only(Vec::new())
    }

    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Grant::Only(ids.into_iter().map(Into::into).collect())
    }

    /// Keeps `All` as is; drops ids rejected by `known` and duplicates.
    pub fn retain_known(self, known: impl Fn(&str) -> bool) -> Self {
        match self {
            Grant::All => Grant::All,
            Grant::Only(ids) => {
                let mut kept: Vec<String> = Vec::with_capacity(ids.len());
                for id in ids {
                    if known(&id) && !kept.contains(&id) {
                        kept.push(id);
                    }
                }
                Grant::Only(kept)
            }
        }
    }
}

impl Default for Grant {
    fn default() -> Self {
        Grant::none()
    }
}

impl From<Vec<String>> for Grant {
    fn from(ids: Vec<String>) -> Self {
        if ids.iter().any(|id| id == WILDCARD) {
            Grant::All
        } else {
            Grant::Only(ids)
        }
    }
}

impl From<Grant> for Vec<String> {
    fn from(grant: Grant) -> Self {
        match grant {
            Grant::All => vec![WILDCARD.to_string()],
            Grant::Only(ids) => ids,
        }
    }
}

/// Account-level override of a role value.
///
/// `Inherit` serializes as `null`; `Explicit(vec![])` is a real override to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Override<T> {
    #[default]
    Inherit,
    Explicit(T),
}

impl<T> Override<T> {
    pub fn as_explicit(&self) -> Option<&T> {
        match self {
            Override::Inherit => None,
            Override::Explicit(value) => Some(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Override<U> {
        match self {
            Override::Inherit => Override::Inherit,
            Override::Explicit(value) => Override::Explicit(f(value)),
        }
    }
}

impl<T> From<Option<T>> for Override<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Override::Explicit(v),
            None => Override::Inherit,
        }
    }
}

impl<T> From<Override<T>> for Option<T> {
    fn from(value: Override<T>) -> Self {
        match value {
            Override::Inherit => None,
            Override::Explicit(v) => Some(v),
        }
    }
}

impl<T: Serialize> Serialize for Override<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Override::Inherit => serializer.serialize_none(),
            Override::Explicit(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Override<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

/// Role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Grant,
    #[serde(default)]
    pub bot_buttons: Grant,
    /// Default employee scope for members; `None` = unrestricted
    #[serde(default)]
    pub allowed_employee_ids: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_departments: Option<Vec<String>>,
}

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub permissions: Override<Grant>,
    #[serde(default)]
    pub bot_buttons: Override<Grant>,
    pub password_salt: String,
    pub password_hash: String,
    #[serde(default)]
    pub allowed_employee_ids: Override<Vec<String>>,
    #[serde(default)]
    pub allowed_departments: Override<Vec<String>>,
}

/// Everything the credential store persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub users: Vec<UserAccount>,
}

impl CredentialSnapshot {
    pub fn role(&self, id: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn role_mut(&mut self, id: &str) -> Option<&mut Role> {
        self.roles.iter_mut().find(|r| r.id == id)
    }

    pub fn user(&self, id: &str) -> Option<&UserAccount> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_mut(&mut self, id: &str) -> Option<&mut UserAccount> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    pub fn user_by_login(&self, login: &str) -> Option<&UserAccount> {
        self.users.iter().find(|u| u.login == login)
    }

    pub fn role_in_use(&self, role_id: &str) -> bool {
        self.users
            .iter()
            .any(|u| u.role_id.as_deref() == Some(role_id))
    }
}

/// Point-in-time effective view of an account. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUser {
    pub id: String,
    pub login: String,
    pub role_id: Option<String>,
    pub role_name: Option<String>,
    pub display_name: Option<String>,
    pub permissions: Vec<String>,
    pub bot_buttons: Vec<String>,
    /// `None` = unrestricted
    pub allowed_employee_ids: Option<Vec<String>>,
    pub allowed_departments: Option<Vec<String>>,
}

impl ResolvedUser {
    pub fn is_unrestricted(&self) -> bool {
        self.allowed_employee_ids.is_none() && self.allowed_departments.is_none()
    }
}
