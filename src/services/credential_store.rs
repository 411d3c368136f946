//! 凭据存储：角色与账户的增删改查
//!
//! All reads go through an in-memory snapshot. Every mutation holds the write
//! lock for validate -> mutate a copy -> flush -> swap, so concurrent writers
//! are serialized and a failed flush leaves the snapshot untouched.

use crate::{
    auth::password::{PasswordDigest, PasswordHasher},
    catalog::Catalog,
    directory::{DirectoryView, EmployeeDirectory},
    error::AccessError,
    models::*,
    repository::CredentialBackend,
};
use secrecy::{ExposeSecret, Secret};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::RwLock;

/// Login of the account created on first start
pub const BOOTSTRAP_LOGIN: &str = "admin";

pub const OWNER_ROLE: &str = "owner";
pub const EMPLOYEE_ROLE: &str = "employee";

pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
    state: RwLock<CredentialSnapshot>,
    catalog: Arc<Catalog>,
    directory: Arc<dyn EmployeeDirectory>,
    hasher: PasswordHasher,
    /// 未知登录名也要走一次完整校验，耗时与密码错误一致
    dummy: PasswordDigest,
    password_checks: AtomicU64,
}

fn generate_id(bytes: usize) -> String {
    let raw: Vec<u8> = (0..bytes).map(|_| rand::random::<u8>()).collect();
    hex::encode(raw)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 在阻塞线程池中计算 Argon2 哈希
async fn hash_blocking(hasher: &PasswordHasher, password: String) -> Result<PasswordDigest, AccessError> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AccessError::Crypto(format!("hashing task failed: {e}")))?
}

fn default_roles(catalog: &Catalog) -> Vec<Role> {
    vec![
        Role {
            id: OWNER_ROLE.to_string(),
            name: "Owner".to_string(),
            permissions: Grant::All,
            bot_buttons: Grant::All,
            allowed_employee_ids: None,
            allowed_departments: None,
        },
        Role {
            id: EMPLOYEE_ROLE.to_string(),
            name: "Employee".to_string(),
            permissions: Grant::none(),
            bot_buttons: Grant::Only(catalog.default_user_buttons()),
            allowed_employee_ids: None,
            allowed_departments: None,
        },
    ]
}

impl CredentialStore {
    /// Load the snapshot, seed defaults on a fresh store and make sure the
    /// bootstrap account exists.
    pub async fn open(
        backend: Arc<dyn CredentialBackend>,
        catalog: Arc<Catalog>,
        directory: Arc<dyn EmployeeDirectory>,
        hasher: PasswordHasher,
        bootstrap_password: &Secret<String>,
    ) -> Result<Self, AccessError> {
        let mut snapshot = backend.load().await?;
        let mut changed = false;

        if snapshot.roles.is_empty() && snapshot.users.is_empty() {
            snapshot.roles = default_roles(&catalog);
            changed = true;
            tracing::info!("Seeded default roles");
        }

        if snapshot.user_by_login(BOOTSTRAP_LOGIN).is_none() {
            let digest =
                hash_blocking(&hasher, bootstrap_password.expose_secret().clone()).await?;
            let id = if snapshot.user(BOOTSTRAP_LOGIN).is_none() {
                BOOTSTRAP_LOGIN.to_string()
            } else {
                generate_id(8)
            };

            // owner 角色被删除时直接给账户全部权限，保证系统始终可登录
            let owner_exists = snapshot.role(OWNER_ROLE).is_some();
            snapshot.users.push(UserAccount {
                id: id.clone(),
                login: BOOTSTRAP_LOGIN.to_string(),
                role_id: owner_exists.then(|| OWNER_ROLE.to_string()),
                permissions: if owner_exists {
                    Override::Inherit
                } else {
                    Override::Explicit(Grant::All)
                },
                bot_buttons: if owner_exists {
                    Override::Inherit
                } else {
                    Override::Explicit(Grant::All)
                },
                password_salt: digest.salt,
                password_hash: digest.hash,
                allowed_employee_ids: Override::Inherit,
                allowed_departments: Override::Inherit,
            });
            changed = true;
            tracing::info!(user_id = %id, login = BOOTSTRAP_LOGIN, "Created bootstrap account");
        }

        if changed {
            backend.save(&snapshot).await?;
        }

        let dummy = hash_blocking(&hasher, generate_id(16)).await?;

        Ok(Self {
            backend,
            state: RwLock::new(snapshot),
            catalog,
            directory,
            hasher,
            dummy,
            password_checks: AtomicU64::new(0),
        })
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub async fn snapshot(&self) -> CredentialSnapshot {
        self.state.read().await.clone()
    }

    pub async fn roles(&self) -> Vec<Role> {
        self.state.read().await.roles.clone()
    }

    pub async fn users(&self) -> Vec<UserAccount> {
        self.state.read().await.users.clone()
    }

    pub async fn get_role(&self, id: &str) -> Option<Role> {
        self.state.read().await.role(id).cloned()
    }

    pub async fn get_user(&self, id: &str) -> Option<UserAccount> {
        self.state.read().await.user(id).cloned()
    }

    pub async fn find_by_login(&self, login: &str) -> Option<UserAccount> {
        self.state.read().await.user_by_login(login).cloned()
    }

    /// Account and its role, read under one lock
    pub async fn account_with_role(&self, id: &str) -> Option<(UserAccount, Option<Role>)> {
        let state = self.state.read().await;
        let account = state.user(id)?.clone();
        let role = account
            .role_id
            .as_deref()
            .and_then(|role_id| state.role(role_id))
            .cloned();
        Some((account, role))
    }

    /// Verify a password for an account off the async runtime
    pub async fn verify_password(&self, account: &UserAccount, password: &str) -> bool {
        self.verify_blocking(password, &account.password_salt, &account.password_hash)
            .await
    }

    /// Spend the same Argon2 work as a real check for a login that has no
    /// account. Always `false`.
    pub async fn verify_unknown(&self, password: &str) -> bool {
        let _ = self
            .verify_blocking(password, &self.dummy.salt, &self.dummy.hash)
            .await;
        false
    }

    /// Number of password verifications run since the store was opened
    pub fn password_checks(&self) -> u64 {
        self.password_checks.load(Ordering::Relaxed)
    }

    async fn verify_blocking(&self, password: &str, salt: &str, hash: &str) -> bool {
        self.password_checks.fetch_add(1, Ordering::Relaxed);
        let hasher = self.hasher.clone();
        let (password, salt, hash) = (password.to_string(), salt.to_string(), hash.to_string());

        tokio::task::spawn_blocking(move || hasher.verify(&password, &salt, &hash))
            .await
            .unwrap_or(false)
    }

    // ==================== Roles ====================

    pub async fn create_role(&self, spec: RoleSpec) -> Result<Role, AccessError> {
        let view = self.scope_view(spec.allowed_employee_ids.is_some() || spec.allowed_departments.is_some()).await?;

        let id = non_empty(spec.id).unwrap_or_else(|| generate_id(6));
        let role = Role {
            name: non_empty(spec.name).unwrap_or_else(|| id.clone()),
            permissions: self.known_permissions(spec.permissions.unwrap_or_default()),
            bot_buttons: self.known_buttons(spec.bot_buttons.unwrap_or_default()),
            allowed_employee_ids: spec.allowed_employee_ids.map(|ids| view.known_employee_ids(&ids)),
            allowed_departments: spec.allowed_departments.map(|d| view.known_departments(&d)),
            id,
        };

        let created = self
            .mutate(|state| {
                if state.role(&role.id).is_some() {
                    return Err(AccessError::RoleExists);
                }
                state.roles.push(role.clone());
                Ok(role)
            })
            .await?;

        tracing::info!(role_id = %created.id, "Role created");
        Ok(created)
    }

    pub async fn update_role(&self, id: &str, patch: RolePatch) -> Result<Role, AccessError> {
        let view = self
            .scope_view(patch.allowed_employee_ids.is_some() || patch.allowed_departments.is_some())
            .await?;

        let name = non_empty(patch.name);
        let permissions = patch.permissions.map(|g| self.known_permissions(g));
        let bot_buttons = patch.bot_buttons.map(|g| self.known_buttons(g));
        let allowed_employee_ids = patch
            .allowed_employee_ids
            .map(|ids| ids.map(|ids| view.known_employee_ids(&ids)));
        let allowed_departments = patch
            .allowed_departments
            .map(|d| d.map(|d| view.known_departments(&d)));

        let updated = self
            .mutate(|state| {
                let role = state.role_mut(id).ok_or(AccessError::RoleNotFound)?;
                if let Some(name) = name {
                    role.name = name;
                }
                if let Some(permissions) = permissions {
                    role.permissions = permissions;
                }
                if let Some(bot_buttons) = bot_buttons {
                    role.bot_buttons = bot_buttons;
                }
                if let Some(ids) = allowed_employee_ids {
                    role.allowed_employee_ids = ids;
                }
                if let Some(departments) = allowed_departments {
                    role.allowed_departments = departments;
                }
                Ok(role.clone())
            })
            .await?;

        tracing::info!(role_id = %id, "Role updated");
        Ok(updated)
    }

    /// Removing an unknown role is a no-op
    pub async fn delete_role(&self, id: &str) -> Result<(), AccessError> {
        self.mutate(|state| {
            if state.role_in_use(id) {
                return Err(AccessError::RoleInUse);
            }
            state.roles.retain(|r| r.id != id);
            Ok(())
        })
        .await?;

        tracing::info!(role_id = %id, "Role deleted");
        Ok(())
    }

    // ==================== Users ====================

    pub async fn create_user(&self, spec: UserSpec) -> Result<UserAccount, AccessError> {
        if spec.login.trim().is_empty() || spec.password.is_empty() {
            return Err(AccessError::LoginPasswordRequired);
        }

        let id = non_empty(spec.id).unwrap_or_else(|| generate_id(8));
        let role_id = non_empty(spec.role_id);

        // 快速失败，避免为注定失败的请求计算哈希；写锁内会再次检查
        {
            let state = self.state.read().await;
            Self::check_new_user(&state, &id, &spec.login, role_id.as_deref())?;
        }

        let view = self
            .scope_view(
                spec.allowed_employee_ids.as_explicit().is_some()
                    || spec.allowed_departments.as_explicit().is_some(),
            )
            .await?;
        let digest = hash_blocking(&self.hasher, spec.password).await?;

        let account = UserAccount {
            id,
            login: spec.login,
            role_id,
            permissions: spec.permissions.map(|g| self.known_permissions(g)),
            bot_buttons: spec.bot_buttons.map(|g| self.known_buttons(g)),
            password_salt: digest.salt,
            password_hash: digest.hash,
            allowed_employee_ids: spec
                .allowed_employee_ids
                .map(|ids| view.known_employee_ids(&ids)),
            allowed_departments: spec
                .allowed_departments
                .map(|d| view.known_departments(&d)),
        };

        let created = self
            .mutate(|state| {
                Self::check_new_user(state, &account.id, &account.login, account.role_id.as_deref())?;
                state.users.push(account.clone());
                Ok(account)
            })
            .await?;

        tracing::info!(user_id = %created.id, login = %created.login, "User created");
        Ok(created)
    }

    fn check_new_user(
        state: &CredentialSnapshot,
        id: &str,
        login: &str,
        role_id: Option<&str>,
    ) -> Result<(), AccessError> {
        if state.user(id).is_some() {
            return Err(AccessError::UserExists);
        }
        if state.user_by_login(login).is_some() {
            return Err(AccessError::LoginExists);
        }
        if let Some(role_id) = role_id {
            if state.role(role_id).is_none() {
                return Err(AccessError::RoleNotFound);
            }
        }
        Ok(())
    }

    pub async fn update_user(&self, id: &str, patch: UserPatch) -> Result<UserAccount, AccessError> {
        if self.state.read().await.user(id).is_none() {
            return Err(AccessError::UserNotFound);
        }

        let view = self
            .scope_view(patch.allowed_employee_ids.is_some() || patch.allowed_departments.is_some())
            .await?;
        let digest = match non_empty(patch.password) {
            Some(password) => Some(hash_blocking(&self.hasher, password).await?),
            None => None,
        };

        let login = non_empty(patch.login);
        let role_id = patch.role_id.map(non_empty);
        let permissions = patch
            .permissions
            .map(|o| o.map(|g| self.known_permissions(g)));
        let bot_buttons = patch.bot_buttons.map(|o| o.map(|g| self.known_buttons(g)));
        let allowed_employee_ids = patch
            .allowed_employee_ids
            .map(|o| o.map(|ids| view.known_employee_ids(&ids)));
        let allowed_departments = patch
            .allowed_departments
            .map(|o| o.map(|d| view.known_departments(&d)));

        let updated = self
            .mutate(|state| {
                if state.user(id).is_none() {
                    return Err(AccessError::UserNotFound);
                }
                if let Some(login) = &login {
                    if state.users.iter().any(|u| u.login == *login && u.id != id) {
                        return Err(AccessError::LoginExists);
                    }
                }
                if let Some(Some(role_id)) = &role_id {
                    if state.role(role_id).is_none() {
                        return Err(AccessError::RoleNotFound);
                    }
                }

                let user = state.user_mut(id).ok_or(AccessError::UserNotFound)?;
                if let Some(login) = login {
                    user.login = login;
                }
                if let Some(role_id) = role_id {
                    user.role_id = role_id;
                }
                if let Some(permissions) = permissions {
                    user.permissions = permissions;
                }
                if let Some(bot_buttons) = bot_buttons {
                    user.bot_buttons = bot_buttons;
                }
                if let Some(ids) = allowed_employee_ids {
                    user.allowed_employee_ids = ids;
                }
                if let Some(departments) = allowed_departments {
                    user.allowed_departments = departments;
                }
                if let Some(digest) = digest {
                    user.password_salt = digest.salt;
                    user.password_hash = digest.hash;
                }
                Ok(user.clone())
            })
            .await?;

        tracing::info!(user_id = %id, "User updated");
        Ok(updated)
    }

    /// Idempotent
    pub async fn delete_user(&self, id: &str) -> Result<(), AccessError> {
        self.mutate(|state| {
            state.users.retain(|u| u.id != id);
            Ok(())
        })
        .await?;

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    // ==================== helpers ====================

    /// The single write path: mutate a copy, flush it, then publish it.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut CredentialSnapshot) -> Result<T, AccessError>,
    ) -> Result<T, AccessError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let out = f(&mut next)?;

        if next != *state {
            self.backend.save(&next).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to persist credential snapshot");
                e
            })?;
            *state = next;
        }
        Ok(out)
    }

    fn known_permissions(&self, grant: Grant) -> Grant {
        grant.retain_known(|id| self.catalog.is_permission(id))
    }

    fn known_buttons(&self, grant: Grant) -> Grant {
        grant.retain_known(|id| self.catalog.is_button(id))
    }

    /// Directory listing for scope validation; skipped when nothing needs it
    async fn scope_view(&self, needed: bool) -> Result<DirectoryView, AccessError> {
        if !needed {
            return Ok(DirectoryView::default());
        }
        Ok(DirectoryView::capture(self.directory.as_ref()).await?)
    }
}
