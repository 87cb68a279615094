use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::SsoStore;
use crate::error::StoreError;
use crate::models::{
    AppModule, AuthorizationCode, Client, CodeConsumption, SigningConfig, UserCredentials,
    UserProfile,
};

const SCHEMA: &str = include_str!("../../migrations/sqlite/001_sso_schema.sql");

/// SQLite implementation of [`SsoStore`]
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url` and applies the schema.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. Useful for testing.
    ///
    /// Limited to one connection that never expires, since every SQLite
    /// connection to `:memory:` would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    // -- Provisioning --
    //
    // Administration of clients, users and permissions happens outside the
    // broker. These helpers cover bootstrapping and tests.

    /// Stores a new enabled signing configuration. The newest `updated_at` wins.
    pub async fn insert_signing_config(
        &self,
        config: &SigningConfig,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tb_sso_config
                 (issuer, jwt_alg, jwt_secret, jwt_ttl_seconds, code_ttl_seconds,
                  state_ttl_seconds, enabled, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&config.issuer)
        .bind(&config.jwt_alg)
        .bind(&config.jwt_secret)
        .bind(config.jwt_ttl_secs)
        .bind(config.code_ttl_secs)
        .bind(config.state_ttl_secs)
        .bind(updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn disable_signing_configs(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE tb_sso_config SET enabled = 0")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert_client(
        &self,
        client_id: &str,
        secret_hash: &str,
        audience: &str,
        enabled: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tb_sso_client (client_id, client_secret_hash, audience, enabled)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (client_id) DO UPDATE SET
                 client_secret_hash = excluded.client_secret_hash,
                 audience = excluded.audience,
                 enabled = excluded.enabled",
        )
        .bind(client_id)
        .bind(secret_hash)
        .bind(audience)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_client_enabled(&self, client_id: &str, enabled: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE tb_sso_client SET enabled = ? WHERE client_id = ?")
            .bind(enabled)
            .bind(client_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_redirect(&self, client_id: &str, redirect_url: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tb_sso_client_redirect (client_id, redirect_url, enabled)
             VALUES (?, ?, 1)
             ON CONFLICT (client_id, redirect_url) DO UPDATE SET enabled = 1",
        )
        .bind(client_id)
        .bind(redirect_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_redirect_enabled(
        &self,
        client_id: &str,
        redirect_url: &str,
        enabled: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE tb_sso_client_redirect SET enabled = ?
             WHERE client_id = ? AND redirect_url = ?",
        )
        .bind(enabled)
        .bind(client_id)
        .bind(redirect_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_user(
        &self,
        profile: &UserProfile,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tb_user (user_id, email, name, password_hash, is_active)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE SET
                 email = excluded.email,
                 name = excluded.name,
                 password_hash = excluded.password_hash,
                 is_active = excluded.is_active",
        )
        .bind(&profile.user_id)
        .bind(profile.email.to_lowercase())
        .bind(&profile.name)
        .bind(password_hash)
        .bind(profile.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE tb_user SET is_active = ? WHERE user_id = ?")
            .bind(is_active)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_role(&self, code: &str, is_active: bool) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tb_role (code, is_active) VALUES (?, ?)
             ON CONFLICT (code) DO UPDATE SET is_active = excluded.is_active",
        )
        .bind(code)
        .bind(is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn assign_role(&self, user_id: &str, role_code: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO tb_user_role (user_id, role_id)
             SELECT ?, role_id FROM tb_role WHERE code = ?",
        )
        .bind(user_id)
        .bind(role_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_app_module(&self, client_id: &str, module: &AppModule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tb_app_module (client_id, module_key, module_label, enabled)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (client_id, module_key) DO UPDATE SET
                 module_label = excluded.module_label,
                 enabled = excluded.enabled",
        )
        .bind(client_id)
        .bind(&module.module_key)
        .bind(&module.module_label)
        .bind(module.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `allowed = None` stores a NULL, which reads back as granted.
    pub async fn set_permission(
        &self,
        client_id: &str,
        user_id: &str,
        module_key: &str,
        allowed: Option<bool>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tb_user_app_module_perm (client_id, user_id, module_key, allowed)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (client_id, user_id, module_key) DO UPDATE SET
                 allowed = excluded.allowed",
        )
        .bind(client_id)
        .bind(user_id)
        .bind(module_key)
        .bind(allowed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn row_to_code(row: &SqliteRow) -> Result<AuthorizationCode, sqlx::Error> {
    Ok(AuthorizationCode {
        code: row.try_get("code")?,
        state: row.try_get("state")?,
        client_id: row.try_get("client_id")?,
        user_id: row.try_get("user_id")?,
        request_ip: row.try_get("request_ip")?,
        user_agent: row.try_get("user_agent")?,
        created_at: from_epoch(row.try_get("created_at")?),
        expires_at: from_epoch(row.try_get("expires_at")?),
        used_at: row.try_get::<Option<i64>, _>("used_at")?.map(from_epoch),
    })
}

fn row_to_profile(row: &SqliteRow) -> Result<UserProfile, sqlx::Error> {
    Ok(UserProfile {
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl SsoStore for SqliteStore {
    async fn load_active_config(&self) -> Result<Option<SigningConfig>, StoreError> {
        let row = sqlx::query(
            "SELECT issuer, jwt_alg, jwt_secret, jwt_ttl_seconds, code_ttl_seconds,
                    state_ttl_seconds
             FROM tb_sso_config
             WHERE enabled = 1
             ORDER BY updated_at DESC, config_id DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(SigningConfig {
            issuer: row.try_get("issuer")?,
            jwt_alg: row.try_get("jwt_alg")?,
            jwt_secret: row.try_get("jwt_secret")?,
            jwt_ttl_secs: row.try_get("jwt_ttl_seconds")?,
            code_ttl_secs: row.try_get("code_ttl_seconds")?,
            state_ttl_secs: row.try_get("state_ttl_seconds")?,
        }))
    }

    async fn load_clients(&self) -> Result<Vec<Client>, StoreError> {
        let rows = sqlx::query(
            "SELECT client_id, client_secret_hash, audience, enabled
             FROM tb_sso_client
             ORDER BY client_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let redirect_rows = sqlx::query(
            "SELECT client_id, redirect_url
             FROM tb_sso_client_redirect
             WHERE enabled = 1
             ORDER BY redirect_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut clients = Vec::with_capacity(rows.len());
        for row in &rows {
            clients.push(Client {
                client_id: row.try_get("client_id")?,
                secret_hash: row.try_get("client_secret_hash")?,
                audience: row.try_get("audience")?,
                enabled: row.try_get("enabled")?,
                redirects: Vec::new(),
            });
        }
        for row in &redirect_rows {
            let client_id: String = row.try_get("client_id")?;
            if let Some(client) = clients.iter_mut().find(|c| c.client_id == client_id) {
                client.redirects.push(row.try_get("redirect_url")?);
            }
        }
        Ok(clients)
    }

    async fn insert_code(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO tb_sso_code
                 (code, state, client_id, user_id, request_ip, user_agent,
                  created_at, expires_at, used_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&code.code)
        .bind(&code.state)
        .bind(&code.client_id)
        .bind(&code.user_id)
        .bind(&code.request_ip)
        .bind(&code.user_agent)
        .bind(code.created_at.timestamp())
        .bind(code.expires_at.timestamp())
        .bind(code.used_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateCode)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn consume_code(
        &self,
        code: &str,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CodeConsumption, StoreError> {
        let now = now.timestamp();
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            "UPDATE tb_sso_code SET used_at = ?
             WHERE code = ? AND client_id = ? AND used_at IS NULL AND expires_at >= ?
             RETURNING user_id",
        )
        .bind(now)
        .bind(code)
        .bind(client_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = consumed {
            let user_id: String = row.try_get("user_id")?;
            tx.commit().await?;
            return Ok(CodeConsumption::Consumed { user_id });
        }

        let existing = sqlx::query(
            "SELECT used_at, expires_at FROM tb_sso_code WHERE code = ? AND client_id = ?",
        )
        .bind(code)
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.rollback().await?;

        let Some(row) = existing else {
            return Ok(CodeConsumption::NotFound);
        };
        let used_at: Option<i64> = row.try_get("used_at")?;
        if used_at.is_some() {
            return Ok(CodeConsumption::AlreadyUsed);
        }
        let expires_at: i64 = row.try_get("expires_at")?;
        if expires_at < now {
            return Ok(CodeConsumption::Expired);
        }
        // Unreachable unless the row changed between the two statements
        Ok(CodeConsumption::AlreadyUsed)
    }

    async fn find_code(&self, code: &str) -> Result<Option<AuthorizationCode>, StoreError> {
        let row = sqlx::query(
            "SELECT code, state, client_id, user_id, request_ip, user_agent,
                    created_at, expires_at, used_at
             FROM tb_sso_code WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_code).transpose()?)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query("SELECT user_id, email, name, is_active FROM tb_user WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_profile).transpose()?)
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, email, name, is_active, password_hash
             FROM tb_user WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserCredentials {
            profile: row_to_profile(&row)?,
            password_hash: row.try_get("password_hash")?,
        }))
    }

    async fn list_user_roles(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT r.code
             FROM tb_user_role ur
             JOIN tb_role r ON r.role_id = ur.role_id
             WHERE ur.user_id = ? AND r.is_active = 1
             ORDER BY r.code",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let roles = rows
            .iter()
            .map(|r| r.try_get::<String, _>("code"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(roles)
    }

    async fn list_app_modules(&self, client_id: &str) -> Result<Vec<AppModule>, StoreError> {
        let rows = sqlx::query(
            "SELECT module_key, module_label, enabled
             FROM tb_app_module
             WHERE client_id = ? AND enabled = 1
             ORDER BY module_label, module_key",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        let mut modules = Vec::with_capacity(rows.len());
        for row in &rows {
            modules.push(AppModule {
                module_key: row.try_get("module_key")?,
                module_label: row.try_get("module_label")?,
                enabled: row.try_get("enabled")?,
            });
        }
        Ok(modules)
    }

    async fn list_module_permissions(
        &self,
        client_id: &str,
        user_id: &str,
    ) -> Result<Vec<(String, bool)>, StoreError> {
        let rows = sqlx::query(
            "SELECT module_key, allowed
             FROM tb_user_app_module_perm
             WHERE client_id = ? AND user_id = ?
             ORDER BY module_key",
        )
        .bind(client_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut perms = Vec::with_capacity(rows.len());
        for row in &rows {
            let allowed: Option<bool> = row.try_get("allowed")?;
            perms.push((row.try_get("module_key")?, allowed.unwrap_or(true)));
        }
        Ok(perms)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
