//! 凭据存储集成测试

use async_trait::async_trait;
use secrecy::Secret;
use staff_access::{
    catalog::Catalog,
    error::{AccessError, StoreError},
    models::*,
    repository::{CredentialBackend, JsonFileBackend, MemoryBackend},
    services::CredentialStore,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

mod common;
use common::{build_service, build_service_with, test_directory, test_hasher};

fn user_spec(id: &str, login: &str) -> UserSpec {
    UserSpec {
        id: Some(id.to_string()),
        login: login.to_string(),
        password: "secret".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_role_errors() {
    let access = build_service().await;

    let spec = RoleSpec {
        id: Some("owner".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        access.create_role(spec).await,
        Err(AccessError::RoleExists)
    ));

    assert!(matches!(
        access.update_role("ghost", RolePatch::default()).await,
        Err(AccessError::RoleNotFound)
    ));

    // 删除不存在的角色是幂等的
    access.delete_role("ghost").await.unwrap();
}

#[tokio::test]
async fn test_user_errors() {
    let access = build_service().await;
    access.create_user(user_spec("1", "clerk")).await.unwrap();

    assert!(matches!(
        access.create_user(user_spec("1", "other")).await,
        Err(AccessError::UserExists)
    ));
    assert!(matches!(
        access.create_user(user_spec("2", "clerk")).await,
        Err(AccessError::LoginExists)
    ));
    assert!(matches!(
        access
            .create_user(UserSpec {
                role_id: Some("ghost".to_string()),
                ..user_spec("3", "third")
            })
            .await,
        Err(AccessError::RoleNotFound)
    ));
    assert!(matches!(
        access
            .create_user(UserSpec {
                password: String::new(),
                ..user_spec("4", "fourth")
            })
            .await,
        Err(AccessError::LoginPasswordRequired)
    ));
    assert!(matches!(
        access.create_user(user_spec("5", "  ")).await,
        Err(AccessError::LoginPasswordRequired)
    ));

    assert!(matches!(
        access.update_user("ghost", UserPatch::default()).await,
        Err(AccessError::UserNotFound)
    ));
    assert!(matches!(
        access
            .update_user(
                "1",
                UserPatch {
                    login: Some("admin".to_string()),
                    ..Default::default()
                }
            )
            .await,
        Err(AccessError::LoginExists)
    ));
    assert!(matches!(
        access
            .update_user(
                "1",
                UserPatch {
                    role_id: Some(Some("ghost".to_string())),
                    ..Default::default()
                }
            )
            .await,
        Err(AccessError::RoleNotFound)
    ));

    // 删除用户是幂等的
    access.delete_user("1").await.unwrap();
    access.delete_user("1").await.unwrap();
}

#[tokio::test]
async fn test_update_password_and_login() {
    let access = build_service().await;
    access.create_user(user_spec("1", "clerk")).await.unwrap();

    access
        .update_user(
            "1",
            UserPatch {
                login: Some("cashier".to_string()),
                password: Some("new-secret".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(access.authenticate("clerk", "secret").await.unwrap().is_none());
    assert!(access.authenticate("cashier", "secret").await.unwrap().is_none());
    assert!(access
        .authenticate("cashier", "new-secret")
        .await
        .unwrap()
        .is_some());

    // 空登录名与空密码被忽略
    access
        .update_user(
            "1",
            UserPatch {
                login: Some(String::new()),
                password: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(access
        .authenticate("cashier", "new-secret")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_override_reset_to_inherit() {
    let access = build_service().await;
    access
        .create_user(UserSpec {
            role_id: Some("employee".to_string()),
            permissions: Override::Explicit(Grant::only(["reports"])),
            ..user_spec("1", "clerk")
        })
        .await
        .unwrap();

    let updated = access
        .update_user(
            "1",
            UserPatch {
                permissions: Some(Override::Inherit),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.permissions, Override::Inherit);

    let resolved = access.resolve_user("1").await.unwrap().unwrap();
    assert!(resolved.permissions.is_empty());
}

#[tokio::test]
async fn test_json_backend_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.json");

    let access = build_service_with(
        Arc::new(JsonFileBackend::new(&path)),
        Catalog::builtin(),
        test_directory(),
    )
    .await;
    access.create_user(user_spec("1", "clerk")).await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["roles"].as_array().unwrap().len(), 2);
    assert_eq!(raw["users"].as_array().unwrap().len(), 2);
    assert_eq!(raw["roles"][0]["permissions"], serde_json::json!(["*"]));

    let reopened = build_service_with(
        Arc::new(JsonFileBackend::new(&path)),
        Catalog::builtin(),
        test_directory(),
    )
    .await;
    assert!(reopened.authenticate("clerk", "secret").await.unwrap().is_some());
    assert_eq!(reopened.store().users().await.len(), 2);
}

/// Backend whose saves can be switched off
struct FlakyBackend {
    inner: MemoryBackend,
    failing: AtomicBool,
}

#[async_trait]
impl CredentialBackend for FlakyBackend {
    async fn load(&self) -> Result<CredentialSnapshot, StoreError> {
        self.inner.load().await
    }

    async fn save(&self, snapshot: &CredentialSnapshot) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save(snapshot).await
    }
}

#[tokio::test]
async fn test_failed_flush_leaves_memory_unchanged() {
    let backend = Arc::new(FlakyBackend {
        inner: MemoryBackend::new(),
        failing: AtomicBool::new(false),
    });
    let store = CredentialStore::open(
        backend.clone(),
        Arc::new(Catalog::builtin()),
        test_directory(),
        test_hasher(),
        &Secret::new("admin".to_string()),
    )
    .await
    .unwrap();

    backend.failing.store(true, Ordering::SeqCst);
    let result = store
        .create_role(RoleSpec {
            id: Some("auditor".to_string()),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(AccessError::Storage(_))));
    assert!(store.get_role("auditor").await.is_none());
    assert_eq!(store.roles().await.len(), 2);
}

#[tokio::test]
async fn test_concurrent_updates_are_not_lost() {
    let access = build_service().await;
    access
        .create_user(UserSpec {
            role_id: Some("employee".to_string()),
            ..user_spec("1", "clerk")
        })
        .await
        .unwrap();

    let a = {
        let access = access.clone();
        tokio::spawn(async move {
            access
                .update_user(
                    "1",
                    UserPatch {
                        permissions: Some(Override::Explicit(Grant::only(["reports"]))),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    let b = {
        let access = access.clone();
        tokio::spawn(async move {
            access
                .update_user(
                    "1",
                    UserPatch {
                        bot_buttons: Some(Override::Explicit(Grant::only(["user.profile"]))),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let account = access.store().get_user("1").await.unwrap();
    assert_eq!(account.permissions, Override::Explicit(Grant::only(["reports"])));
    assert_eq!(
        account.bot_buttons,
        Override::Explicit(Grant::only(["user.profile"]))
    );
}
