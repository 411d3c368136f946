//! PostgreSQL backend (角色与账户表)

use super::CredentialBackend;
use crate::{
    error::StoreError,
    models::{CredentialSnapshot, Grant, Override, Role, UserAccount},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};
use std::time::Duration;

pub struct PgBackend {
    db: PgPool,
}

impl PgBackend {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 创建连接池并运行迁移
    pub async fn connect(url: &Secret<String>, max_connections: u32) -> Result<Self, StoreError> {
        tracing::debug!("Creating database connection pool...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url.expose_secret())
            .await
            .map_err(|e| {
                tracing::error!("Failed to create database pool: {}", e);
                StoreError::Database(e)
            })?;

        let backend = Self::new(pool);
        backend.run_migrations().await?;

        tracing::info!(max_connections, "Database pool created successfully");
        Ok(backend)
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                StoreError::Migration(e.to_string())
            })?;

        tracing::info!("Migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

fn json_override<T>(value: Option<Json<T>>) -> Override<T> {
    value.map(|Json(inner)| inner).into()
}

#[async_trait]
impl CredentialBackend for PgBackend {
    async fn load(&self) -> Result<CredentialSnapshot, StoreError> {
        let role_rows = sqlx::query(
            r#"
            SELECT id, name, permissions, bot_buttons, allowed_employee_ids, allowed_departments
            FROM access_roles
            ORDER BY position, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut roles = Vec::with_capacity(role_rows.len());
        for row in role_rows {
            let Json(permissions): Json<Grant> = row.try_get("permissions")?;
            let Json(bot_buttons): Json<Grant> = row.try_get("bot_buttons")?;
            let allowed_employee_ids: Option<Json<Vec<String>>> =
                row.try_get("allowed_employee_ids")?;
            let allowed_departments: Option<Json<Vec<String>>> =
                row.try_get("allowed_departments")?;

            roles.push(Role {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                permissions,
                bot_buttons,
                allowed_employee_ids: allowed_employee_ids.map(|Json(v)| v),
                allowed_departments: allowed_departments.map(|Json(v)| v),
            });
        }

        let user_rows = sqlx::query(
            r#"
            SELECT id, login, role_id, permissions, bot_buttons, password_salt, password_hash,
                   allowed_employee_ids, allowed_departments
            FROM access_users
            ORDER BY position, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut users = Vec::with_capacity(user_rows.len());
        for row in user_rows {
            users.push(UserAccount {
                id: row.try_get("id")?,
                login: row.try_get("login")?,
                role_id: row.try_get("role_id")?,
                permissions: json_override(row.try_get("permissions")?),
                bot_buttons: json_override(row.try_get("bot_buttons")?),
                password_salt: row.try_get("password_salt")?,
                password_hash: row.try_get("password_hash")?,
                allowed_employee_ids: json_override(row.try_get("allowed_employee_ids")?),
                allowed_departments: json_override(row.try_get("allowed_departments")?),
            });
        }

        Ok(CredentialSnapshot { roles, users })
    }

    async fn save(&self, snapshot: &CredentialSnapshot) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM access_users")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM access_roles")
            .execute(&mut *tx)
            .await?;

        for (position, role) in snapshot.roles.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO access_roles
                    (id, name, permissions, bot_buttons, allowed_employee_ids, allowed_departments, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&role.id)
            .bind(&role.name)
            .bind(Json(&role.permissions))
            .bind(Json(&role.bot_buttons))
            .bind(role.allowed_employee_ids.as_ref().map(Json))
            .bind(role.allowed_departments.as_ref().map(Json))
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        for (position, user) in snapshot.users.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO access_users
                    (id, login, role_id, permissions, bot_buttons, password_salt, password_hash,
                     allowed_employee_ids, allowed_departments, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(&user.id)
            .bind(&user.login)
            .bind(&user.role_id)
            .bind(user.permissions.as_explicit().map(Json))
            .bind(user.bot_buttons.as_explicit().map(Json))
            .bind(&user.password_salt)
            .bind(&user.password_hash)
            .bind(user.allowed_employee_ids.as_explicit().map(Json))
            .bind(user.allowed_departments.as_explicit().map(Json))
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            roles = snapshot.roles.len(),
            users = snapshot.users.len(),
            "Credential snapshot saved"
        );
        Ok(())
    }
}
