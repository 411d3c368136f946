//! Authentication and access-management DTOs

use super::access::{Grant, Override, ResolvedUser, Role};
use crate::catalog::{BotButtonDef, PermissionDef};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(null-ish)`).
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub login: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: ResolvedUser,
}

/// Create role request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleSpec {
    pub id: Option<String>,
    pub name: Option<String>,
    pub permissions: Option<Grant>,
    pub bot_buttons: Option<Grant>,
    pub allowed_employee_ids: Option<Vec<String>>,
    pub allowed_departments: Option<Vec<String>>,
}

/// Partial role update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub permissions: Option<Grant>,
    pub bot_buttons: Option<Grant>,
    /// `Some(None)` clears the role's default scope
    #[serde(default, deserialize_with = "present")]
    pub allowed_employee_ids: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub allowed_departments: Option<Option<Vec<String>>>,
}

/// Create user request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSpec {
    pub id: Option<String>,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    pub role_id: Option<String>,
    #[serde(default)]
    pub permissions: Override<Grant>,
    #[serde(default)]
    pub bot_buttons: Override<Grant>,
    #[serde(default)]
    pub allowed_employee_ids: Override<Vec<String>>,
    #[serde(default)]
    pub allowed_departments: Override<Vec<String>>,
}

/// Partial user update
///
/// For override fields, `Some(Override::Inherit)` (JSON `null`) resets the
/// field to the role's value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub login: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub role_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub permissions: Option<Override<Grant>>,
    #[serde(default, deserialize_with = "present")]
    pub bot_buttons: Option<Override<Grant>>,
    #[serde(default, deserialize_with = "present")]
    pub allowed_employee_ids: Option<Override<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub allowed_departments: Option<Override<Vec<String>>>,
}

/// Denormalized account view for the admin panel; never carries credentials
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub login: String,
    pub role_id: Option<String>,
    pub role_name: Option<String>,
    pub permissions: Override<Grant>,
    pub bot_buttons: Override<Grant>,
    pub resolved_permissions: Vec<String>,
    pub resolved_bot_buttons: Vec<String>,
    pub resolved_bot_button_labels: Vec<String>,
    pub display_name: Option<String>,
    pub allowed_employee_ids: Option<Vec<String>>,
    pub allowed_departments: Option<Vec<String>>,
    pub resolved_employee_names: Vec<String>,
    pub resolved_departments: Vec<String>,
}

/// Employee entry offered as a scope choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeOption {
    pub id: String,
    pub name: String,
    pub department: String,
}

/// Everything the access-control page needs in one response
#[derive(Debug, Serialize)]
pub struct AccessConfigResponse {
    pub users: Vec<UserView>,
    pub roles: Vec<Role>,
    pub available_permissions: Vec<PermissionDef>,
    pub available_bot_buttons: Vec<BotButtonDef>,
    pub available_employees: Vec<EmployeeOption>,
    pub available_departments: Vec<String>,
}

/// Caller's employee visibility
#[derive(Debug, Serialize)]
pub struct ScopeResponse {
    pub unrestricted: bool,
    pub employee_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_patch_absent_null_and_value() {
        let patch: UserPatch = serde_json::from_value(json!({
            "permissions": null,
            "bot_buttons": ["user.profile"],
            "role_id": null
        }))
        .unwrap();

        assert_eq!(patch.permissions, Some(Override::Inherit));
        assert_eq!(
            patch.bot_buttons,
            Some(Override::Explicit(Grant::only(["user.profile"])))
        );
        assert_eq!(patch.role_id, Some(None));
        assert!(patch.allowed_employee_ids.is_none());
        assert!(patch.login.is_none());
    }

    #[test]
    fn test_login_request_validation() {
        let req = LoginRequest {
            login: String::new(),
            password: "x".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
