//! Access control orchestration
//!
//! Ties the credential store, the token service and the employee directory
//! together: authentication, effective-permission resolution, employee
//! visibility and the management operations behind the admin API.

use crate::{
    auth::token::TokenService,
    catalog::{BotButtonDef, Catalog, PermissionDef, HOME_BUTTON, WILDCARD},
    directory::{DirectoryView, EmployeeDirectory},
    error::{AccessError, TokenError},
    models::*,
    services::credential_store::CredentialStore,
};
use std::{collections::BTreeSet, sync::Arc};

/// Effective view of `account`.
///
/// Pure: the same inputs always give the same result. Wildcards expand
/// against `catalog` as it is now, and scope ids that the directory no
/// longer knows are dropped.
pub fn resolve_account(
    account: &UserAccount,
    role: Option<&Role>,
    catalog: &Catalog,
    view: &DirectoryView,
) -> ResolvedUser {
    let permission_grant = account
        .permissions
        .as_explicit()
        .or_else(|| role.map(|r| &r.permissions));
    let permissions = match permission_grant {
        None => Vec::new(),
        Some(Grant::All) => catalog.permission_ids(),
        Some(Grant::Only(ids)) => ids
            .iter()
            .filter(|id| catalog.is_permission(id))
            .cloned()
            .collect(),
    };

    let button_grant = account
        .bot_buttons
        .as_explicit()
        .or_else(|| role.map(|r| &r.bot_buttons));
    let mut bot_buttons = match button_grant {
        None => catalog.default_user_buttons(),
        Some(Grant::All) => catalog.gated_button_ids(),
        Some(Grant::Only(ids)) => ids
            .iter()
            .filter(|id| catalog.is_button(id))
            .cloned()
            .collect(),
    };
    if !bot_buttons.iter().any(|b| b == HOME_BUTTON) {
        bot_buttons.push(HOME_BUTTON.to_string());
    }

    let allowed_employee_ids = account
        .allowed_employee_ids
        .as_explicit()
        .cloned()
        .or_else(|| role.and_then(|r| r.allowed_employee_ids.clone()))
        .map(|ids| view.known_employee_ids(&ids));
    let allowed_departments = account
        .allowed_departments
        .as_explicit()
        .cloned()
        .or_else(|| role.and_then(|r| r.allowed_departments.clone()))
        .map(|departments| view.known_departments(&departments));

    ResolvedUser {
        id: account.id.clone(),
        login: account.login.clone(),
        role_id: account.role_id.clone(),
        role_name: role.map(|r| r.name.clone()),
        display_name: view.display_name(&account.id),
        permissions,
        bot_buttons,
        allowed_employee_ids,
        allowed_departments,
    }
}

/// Permission check on a resolved user. The literal `"*"` also matches.
pub fn has_permission(user: &ResolvedUser, permission: &str) -> bool {
    user.permissions
        .iter()
        .any(|p| p == permission || p == WILDCARD)
}

pub struct AccessControlService {
    store: Arc<CredentialStore>,
    tokens: TokenService,
    directory: Arc<dyn EmployeeDirectory>,
    catalog: Arc<Catalog>,
}

impl AccessControlService {
    pub fn new(
        store: Arc<CredentialStore>,
        tokens: TokenService,
        directory: Arc<dyn EmployeeDirectory>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            store,
            tokens,
            directory,
            catalog,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    // ==================== Authentication ====================

    /// Check a login/password pair.
    ///
    /// Unknown login and wrong password both yield `Ok(None)`.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<ResolvedUser>, AccessError> {
        let Some(account) = self.store.find_by_login(login).await else {
            self.store.verify_unknown(password).await;
            tracing::info!(login = %login, "Login failed");
            metrics::counter!("access_login_total", "outcome" => "failure").increment(1);
            return Ok(None);
        };

        if !self.store.verify_password(&account, password).await {
            tracing::info!(login = %login, "Login failed");
            metrics::counter!("access_login_total", "outcome" => "failure").increment(1);
            return Ok(None);
        }

        let user = self.resolve_user(&account.id).await?;
        if let Some(user) = &user {
            tracing::info!(user_id = %user.id, login = %user.login, "User authenticated");
            metrics::counter!("access_login_total", "outcome" => "success").increment(1);
        }
        Ok(user)
    }

    pub fn issue_token(&self, user_id: &str) -> Result<String, AccessError> {
        Ok(self.tokens.issue(user_id)?)
    }

    /// Verify a bearer token and resolve its subject
    pub async fn verify_token(&self, token: &str) -> Result<ResolvedUser, AccessError> {
        let user_id = self.tokens.verify(token).map_err(|e| {
            let reason = match e {
                TokenError::Expired => "expired",
                _ => "invalid",
            };
            metrics::counter!("access_token_rejected_total", "reason" => reason).increment(1);
            AccessError::from(e)
        })?;

        match self.resolve_user(&user_id).await? {
            Some(user) => Ok(user),
            None => {
                tracing::debug!(user_id = %user_id, "Token subject no longer exists");
                metrics::counter!("access_token_rejected_total", "reason" => "unknown_user")
                    .increment(1);
                Err(AccessError::UserNotFound)
            }
        }
    }

    /// `Ok(None)` when the account does not exist
    pub async fn resolve_user(&self, user_id: &str) -> Result<Option<ResolvedUser>, AccessError> {
        let Some((account, role)) = self.store.account_with_role(user_id).await else {
            return Ok(None);
        };
        let view = DirectoryView::capture(self.directory.as_ref()).await?;
        Ok(Some(resolve_account(
            &account,
            role.as_ref(),
            &self.catalog,
            &view,
        )))
    }

    // ==================== Authorization ====================

    pub fn has_permission(&self, user: &ResolvedUser, permission: &str) -> bool {
        has_permission(user, permission)
    }

    /// Employee ids visible to `user`; `None` means every employee.
    pub async fn visible_employee_ids(
        &self,
        user: &ResolvedUser,
    ) -> Result<Option<BTreeSet<String>>, AccessError> {
        if user.is_unrestricted() {
            return Ok(None);
        }

        let mut visible: BTreeSet<String> = user
            .allowed_employee_ids
            .iter()
            .flatten()
            .cloned()
            .collect();

        if let Some(departments) = &user.allowed_departments {
            if !departments.is_empty() {
                for employee in self.directory.list_employees().await? {
                    if employee
                        .department()
                        .is_some_and(|d| departments.iter().any(|allowed| allowed == d))
                    {
                        visible.insert(employee.id);
                    }
                }
            }
        }

        Ok(Some(visible))
    }

    /// Single-employee visibility check.
    ///
    /// An employee-id scope takes precedence over a department scope. With
    /// only a department scope and no `department` given, the directory is
    /// asked for the employee's department.
    pub async fn is_employee_visible(
        &self,
        user: &ResolvedUser,
        employee_id: Option<&str>,
        department: Option<&str>,
    ) -> Result<bool, AccessError> {
        if let Some(ids) = &user.allowed_employee_ids {
            return Ok(employee_id.is_some_and(|id| ids.iter().any(|allowed| allowed == id)));
        }

        let Some(departments) = &user.allowed_departments else {
            return Ok(true);
        };
        let in_scope = |d: &str| departments.iter().any(|allowed| allowed == d.trim());

        match (department, employee_id) {
            (Some(department), _) => Ok(in_scope(department)),
            (None, Some(id)) => Ok(self
                .directory
                .get_employee(id)
                .await?
                .and_then(|e| e.department().map(|d| in_scope(d)))
                .unwrap_or(false)),
            (None, None) => Ok(false),
        }
    }

    // ==================== Bot buttons ====================

    /// Keyboard texts for a chat user; unknown or absent users get the defaults
    pub async fn ui_button_texts(&self, user_id: Option<&str>) -> Result<Vec<String>, AccessError> {
        let resolved = match user_id {
            Some(id) => self.resolve_user(id).await?,
            None => None,
        };

        let ids = match resolved {
            Some(user) => user.bot_buttons,
            None => {
                let mut ids = self.catalog.default_user_buttons();
                ids.push(HOME_BUTTON.to_string());
                ids
            }
        };

        Ok(self.catalog.button_texts(&ids))
    }

    pub fn button_labels(&self, ids: &[String]) -> Vec<String> {
        self.catalog.button_labels(ids)
    }

    // ==================== Admin data ====================

    pub fn available_permissions(&self) -> Vec<PermissionDef> {
        self.catalog.permissions().to_vec()
    }

    pub fn available_bot_buttons(&self) -> Vec<BotButtonDef> {
        self.catalog.bot_buttons().to_vec()
    }

    /// Directory employees as scope choices, sorted by name
    pub async fn available_employees(&self) -> Result<Vec<EmployeeOption>, AccessError> {
        let view = DirectoryView::capture(self.directory.as_ref()).await?;
        Ok(employee_options(&view))
    }

    pub async fn available_departments(&self) -> Result<Vec<String>, AccessError> {
        let view = DirectoryView::capture(self.directory.as_ref()).await?;
        Ok(view.department_names())
    }

    pub async fn list_roles(&self) -> Vec<Role> {
        self.store.roles().await
    }

    /// All accounts with their resolved values; credentials are left out
    pub async fn list_users(&self) -> Result<Vec<UserView>, AccessError> {
        let view = DirectoryView::capture(self.directory.as_ref()).await?;
        let snapshot = self.store.snapshot().await;
        Ok(self.user_views(&snapshot, &view))
    }

    pub async fn access_config(&self) -> Result<AccessConfigResponse, AccessError> {
        let view = DirectoryView::capture(self.directory.as_ref()).await?;
        let snapshot = self.store.snapshot().await;

        Ok(AccessConfigResponse {
            users: self.user_views(&snapshot, &view),
            available_permissions: self.available_permissions(),
            available_bot_buttons: self.available_bot_buttons(),
            available_employees: employee_options(&view),
            available_departments: view.department_names(),
            roles: snapshot.roles,
        })
    }

    fn user_views(&self, snapshot: &CredentialSnapshot, view: &DirectoryView) -> Vec<UserView> {
        snapshot
            .users
            .iter()
            .map(|account| {
                let role = account
                    .role_id
                    .as_deref()
                    .and_then(|role_id| snapshot.role(role_id));
                let resolved = resolve_account(account, role, &self.catalog, view);

                let own_ids = account
                    .allowed_employee_ids
                    .as_explicit()
                    .map(|ids| view.known_employee_ids(ids));
                let own_departments = account
                    .allowed_departments
                    .as_explicit()
                    .map(|d| view.known_departments(d));

                UserView {
                    id: account.id.clone(),
                    login: account.login.clone(),
                    role_id: account.role_id.clone(),
                    role_name: resolved.role_name,
                    permissions: account.permissions.clone(),
                    bot_buttons: account.bot_buttons.clone(),
                    resolved_bot_button_labels: self.catalog.button_labels(&resolved.bot_buttons),
                    resolved_permissions: resolved.permissions,
                    resolved_bot_buttons: resolved.bot_buttons,
                    display_name: resolved.display_name,
                    resolved_employee_names: own_ids
                        .iter()
                        .flatten()
                        .filter_map(|id| view.display_name(id))
                        .collect(),
                    resolved_departments: own_departments.clone().unwrap_or_default(),
                    allowed_employee_ids: own_ids,
                    allowed_departments: own_departments,
                }
            })
            .collect()
    }

    // ==================== Management ====================

    pub async fn create_role(&self, spec: RoleSpec) -> Result<Role, AccessError> {
        self.store.create_role(spec).await
    }

    pub async fn update_role(&self, id: &str, patch: RolePatch) -> Result<Role, AccessError> {
        self.store.update_role(id, patch).await
    }

    pub async fn delete_role(&self, id: &str) -> Result<(), AccessError> {
        self.store.delete_role(id).await
    }

    pub async fn create_user(&self, spec: UserSpec) -> Result<UserAccount, AccessError> {
        self.store.create_user(spec).await
    }

    pub async fn update_user(&self, id: &str, patch: UserPatch) -> Result<UserAccount, AccessError> {
        self.store.update_user(id, patch).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), AccessError> {
        self.store.delete_user(id).await
    }
}

fn employee_options(view: &DirectoryView) -> Vec<EmployeeOption> {
    let mut options: Vec<EmployeeOption> = view
        .employees()
        .iter()
        .map(|e| EmployeeOption {
            id: e.id.clone(),
            name: e.display_name.clone(),
            department: e.department().unwrap_or_default().to_string(),
        })
        .collect();
    options.sort_by_key(|o| o.name.to_lowercase());
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Employee;

    fn account() -> UserAccount {
        UserAccount {
            id: "u1".to_string(),
            login: "clerk".to_string(),
            role_id: None,
            permissions: Override::Inherit,
            bot_buttons: Override::Inherit,
            password_salt: String::new(),
            password_hash: String::new(),
            allowed_employee_ids: Override::Inherit,
            allowed_departments: Override::Inherit,
        }
    }

    fn role() -> Role {
        Role {
            id: "manager".to_string(),
            name: "Manager".to_string(),
            permissions: Grant::only(["employees", "reports"]),
            bot_buttons: Grant::only(["user.view_salary"]),
            allowed_employee_ids: None,
            allowed_departments: Some(vec!["Sales".to_string()]),
        }
    }

    fn view() -> DirectoryView {
        DirectoryView::from_employees(vec![
            Employee::new("u1", "Ann Clerk", Some("Sales")),
            Employee::new("e2", "Bob", Some("Warehouse")),
        ])
    }

    #[test]
    fn test_no_role_no_override() {
        let resolved = resolve_account(&account(), None, &Catalog::builtin(), &view());

        assert!(resolved.permissions.is_empty());
        let mut expected = Catalog::builtin().default_user_buttons();
        expected.push(HOME_BUTTON.to_string());
        assert_eq!(resolved.bot_buttons, expected);
        assert!(resolved.is_unrestricted());
        assert_eq!(resolved.display_name.as_deref(), Some("Ann Clerk"));
    }

    #[test]
    fn test_role_values_inherited() {
        let role = role();
        let resolved = resolve_account(&account(), Some(&role), &Catalog::builtin(), &view());

        assert_eq!(resolved.permissions, vec!["employees", "reports"]);
        assert_eq!(resolved.bot_buttons, vec!["user.view_salary", HOME_BUTTON]);
        assert_eq!(resolved.allowed_departments, Some(vec!["Sales".to_string()]));
        assert_eq!(resolved.role_name.as_deref(), Some("Manager"));
    }

    #[test]
    fn test_explicit_empty_override_beats_role() {
        let mut account = account();
        account.permissions = Override::Explicit(Grant::none());
        account.allowed_departments = Override::Explicit(vec![]);

        let role = role();
        let resolved = resolve_account(&account, Some(&role), &Catalog::builtin(), &view());

        assert!(resolved.permissions.is_empty());
        assert_eq!(resolved.allowed_departments, Some(vec![]));
        assert!(!resolved.is_unrestricted());
    }

    #[test]
    fn test_wildcard_follows_catalog() {
        let mut account = account();
        account.permissions = Override::Explicit(Grant::All);
        account.bot_buttons = Override::Explicit(Grant::All);

        let catalog = Catalog::builtin().with_permission("payroll-export", "Payroll export");
        let resolved = resolve_account(&account, None, &catalog, &view());

        assert_eq!(resolved.permissions, catalog.permission_ids());
        assert!(has_permission(&resolved, "payroll-export"));
        assert!(resolved.bot_buttons.contains(&HOME_BUTTON.to_string()));
        assert_eq!(
            resolved.bot_buttons.iter().filter(|b| *b == HOME_BUTTON).count(),
            1
        );
    }

    #[test]
    fn test_stale_ids_dropped() {
        let mut account = account();
        account.permissions = Override::Explicit(Grant::only(["reports", "retired"]));
        account.allowed_employee_ids = Override::Explicit(vec!["e2".to_string(), "gone".to_string()]);

        let resolved = resolve_account(&account, None, &Catalog::builtin(), &view());
        assert_eq!(resolved.permissions, vec!["reports"]);
        assert_eq!(resolved.allowed_employee_ids, Some(vec!["e2".to_string()]));
    }

    #[test]
    fn test_literal_wildcard_permission() {
        let mut resolved = resolve_account(&account(), None, &Catalog::builtin(), &view());
        assert!(!has_permission(&resolved, "reports"));

        resolved.permissions.push(WILDCARD.to_string());
        assert!(has_permission(&resolved, "reports"));
    }

    #[test]
    fn test_employee_options_sorted_case_insensitive() {
        let view = DirectoryView::from_employees(vec![
            Employee::new("1", "zoe", None),
            Employee::new("2", "Adam", Some("Sales")),
            Employee::new("3", "bella", None),
        ]);
        let names: Vec<String> = employee_options(&view).into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["Adam", "bella", "zoe"]);
    }
}
