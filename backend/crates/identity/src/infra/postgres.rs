//! PostgreSQL Identity Store
//!
//! Schema: `database/migrations/0001_identity.sql`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{Role, RoleClaim, User, UserClaim, UserLogin, UserToken};
use crate::domain::repository::{
    RoleStore, StoreCapabilities, UserClaimStore, UserLoginStore, UserStore, UserTokenStore,
};
use crate::domain::value_object::{
    ConcurrencyStamp, Email, RoleId, SecurityStamp, UserId,
};
use crate::error::{IdentityError, IdentityFailure, IdentityResult};

const USER_COLUMNS: &str = r#"
    id,
    user_name,
    normalized_user_name,
    email,
    normalized_email,
    email_confirmed,
    password_hash,
    security_stamp,
    concurrency_stamp,
    phone_number,
    phone_number_confirmed,
    two_factor_enabled,
    lockout_end,
    lockout_enabled,
    access_failed_count
"#;

/// PostgreSQL-backed identity store
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user_where(&self, column: &str, value: &str) -> IdentityResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 LIMIT 1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserRow::into_user))
    }
}

/// Unique-constraint violations become the matching refusal; everything
/// else stays a database error.
fn unique_violation(err: sqlx::Error, failure: impl FnOnce() -> IdentityFailure) -> IdentityError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => IdentityError::rejected(failure()),
        _ => IdentityError::Database(err),
    }
}

impl StoreCapabilities for PgIdentityStore {}

// ============================================================================
// User Store Implementation
// ============================================================================

impl UserStore for PgIdentityStore {
    async fn create_user(&self, user: &User) -> IdentityResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                user_name,
                normalized_user_name,
                email,
                normalized_email,
                email_confirmed,
                password_hash,
                security_stamp,
                concurrency_stamp,
                phone_number,
                phone_number_confirmed,
                two_factor_enabled,
                lockout_end,
                lockout_enabled,
                access_failed_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.user_name)
        .bind(&user.normalized_user_name)
        .bind(user.email.as_ref().map(Email::as_str))
        .bind(&user.normalized_email)
        .bind(user.email_confirmed)
        .bind(&user.password_hash)
        .bind(user.security_stamp.as_str())
        .bind(user.concurrency_stamp.as_str())
        .bind(&user.phone_number)
        .bind(user.phone_number_confirmed)
        .bind(user.two_factor_enabled)
        .bind(user.lockout_end)
        .bind(user.lockout_enabled)
        .bind(user.access_failed_count)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || IdentityFailure::duplicate_user_name(&user.user_name)))?;

        Ok(())
    }

    async fn update_user(&self, user: &User, expected_stamp: &str) -> IdentityResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE users SET
                user_name = $3,
                normalized_user_name = $4,
                email = $5,
                normalized_email = $6,
                email_confirmed = $7,
                password_hash = $8,
                security_stamp = $9,
                concurrency_stamp = $10,
                phone_number = $11,
                phone_number_confirmed = $12,
                two_factor_enabled = $13,
                lockout_end = $14,
                lockout_enabled = $15,
                access_failed_count = $16
            WHERE id = $1 AND concurrency_stamp = $2
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(expected_stamp)
        .bind(&user.user_name)
        .bind(&user.normalized_user_name)
        .bind(user.email.as_ref().map(Email::as_str))
        .bind(&user.normalized_email)
        .bind(user.email_confirmed)
        .bind(&user.password_hash)
        .bind(user.security_stamp.as_str())
        .bind(user.concurrency_stamp.as_str())
        .bind(&user.phone_number)
        .bind(user.phone_number_confirmed)
        .bind(user.two_factor_enabled)
        .bind(user.lockout_end)
        .bind(user.lockout_enabled)
        .bind(user.access_failed_count)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || IdentityFailure::duplicate_user_name(&user.user_name)))?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn delete_user(&self, user_id: &UserId) -> IdentityResult<bool> {
        // Dependent rows go with ON DELETE CASCADE.
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> IdentityResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_user_by_name(&self, normalized_user_name: &str) -> IdentityResult<Option<User>> {
        self.find_user_where("normalized_user_name", normalized_user_name)
            .await
    }

    async fn find_user_by_email(&self, normalized_email: &str) -> IdentityResult<Option<User>> {
        self.find_user_where("normalized_email", normalized_email).await
    }
}

// ============================================================================
// Login / Token / Claim Store Implementations
// ============================================================================

impl UserLoginStore for PgIdentityStore {
    async fn add_login(&self, login: &UserLogin) -> IdentityResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_logins (login_provider, provider_key, provider_display_name, user_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&login.login_provider)
        .bind(&login.provider_key)
        .bind(&login.provider_display_name)
        .bind(login.user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, IdentityFailure::login_already_associated))?;

        Ok(())
    }

    async fn remove_login(
        &self,
        user_id: &UserId,
        login_provider: &str,
        provider_key: &str,
    ) -> IdentityResult<bool> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM user_logins
            WHERE user_id = $1 AND login_provider = $2 AND provider_key = $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(login_provider)
        .bind(provider_key)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted > 0)
    }

    async fn find_logins(&self, user_id: &UserId) -> IdentityResult<Vec<UserLogin>> {
        let rows = sqlx::query_as::<_, UserLoginRow>(
            r#"
            SELECT login_provider, provider_key, provider_display_name, user_id
            FROM user_logins
            WHERE user_id = $1
            ORDER BY login_provider
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserLoginRow::into_login).collect())
    }

    async fn find_user_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
    ) -> IdentityResult<Option<User>> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM user_logins WHERE login_provider = $1 AND provider_key = $2",
        )
        .bind(login_provider)
        .bind(provider_key)
        .fetch_optional(&self.pool)
        .await?;

        match user_id {
            Some(id) => self.find_user_by_id(&UserId::from_uuid(id)).await,
            None => Ok(None),
        }
    }
}

impl UserTokenStore for PgIdentityStore {
    async fn find_token(
        &self,
        user_id: &UserId,
        login_provider: &str,
        name: &str,
    ) -> IdentityResult<Option<String>> {
        let value = sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT value FROM user_tokens
            WHERE user_id = $1 AND login_provider = $2 AND name = $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(login_provider)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.flatten())
    }

    async fn set_token(&self, token: &UserToken) -> IdentityResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_tokens (user_id, login_provider, name, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, login_provider, name) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(token.user_id.as_uuid())
        .bind(&token.login_provider)
        .bind(&token.name)
        .bind(&token.value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_token(
        &self,
        user_id: &UserId,
        login_provider: &str,
        name: &str,
    ) -> IdentityResult<()> {
        sqlx::query("DELETE FROM user_tokens WHERE user_id = $1 AND login_provider = $2 AND name = $3")
            .bind(user_id.as_uuid())
            .bind(login_provider)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl UserClaimStore for PgIdentityStore {
    async fn find_claims(&self, user_id: &UserId) -> IdentityResult<Vec<UserClaim>> {
        let rows = sqlx::query_as::<_, ClaimRow>(
            r#"
            SELECT id, user_id AS owner_id, claim_type, claim_value
            FROM user_claims
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ClaimRow::into_user_claim).collect())
    }

    async fn add_claim(&self, claim: &UserClaim) -> IdentityResult<()> {
        sqlx::query("INSERT INTO user_claims (user_id, claim_type, claim_value) VALUES ($1, $2, $3)")
            .bind(claim.user_id.as_uuid())
            .bind(&claim.claim_type)
            .bind(&claim.claim_value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// ============================================================================
// Role Store Implementation
// ============================================================================

impl RoleStore for PgIdentityStore {
    async fn create_role(&self, role: &Role) -> IdentityResult<()> {
        sqlx::query(
            "INSERT INTO roles (id, name, normalized_name, concurrency_stamp) VALUES ($1, $2, $3, $4)",
        )
        .bind(role.id.as_uuid())
        .bind(&role.name)
        .bind(&role.normalized_name)
        .bind(role.concurrency_stamp.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || IdentityFailure::duplicate_role_name(&role.name)))?;

        Ok(())
    }

    async fn find_role_by_name(&self, normalized_name: &str) -> IdentityResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, normalized_name, concurrency_stamp FROM roles WHERE normalized_name = $1",
        )
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RoleRow::into_role))
    }

    async fn add_user_to_role(&self, user_id: &UserId, role_id: &RoleId) -> IdentityResult<()> {
        let inserted = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            let name = sqlx::query_scalar::<_, Option<String>>("SELECT name FROM roles WHERE id = $1")
                .bind(role_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .flatten()
                .unwrap_or_default();
            return Err(IdentityError::rejected(IdentityFailure::user_already_in_role(&name)));
        }
        Ok(())
    }

    async fn find_user_roles(&self, user_id: &UserId) -> IdentityResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT r.id, r.name, r.normalized_name, r.concurrency_stamp
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RoleRow::into_role).collect())
    }

    async fn find_role_claims(&self, role_id: &RoleId) -> IdentityResult<Vec<RoleClaim>> {
        let rows = sqlx::query_as::<_, ClaimRow>(
            r#"
            SELECT id, role_id AS owner_id, claim_type, claim_value
            FROM role_claims
            WHERE role_id = $1
            ORDER BY id
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ClaimRow::into_role_claim).collect())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    user_name: String,
    normalized_user_name: String,
    email: Option<String>,
    normalized_email: Option<String>,
    email_confirmed: bool,
    password_hash: Option<String>,
    security_stamp: String,
    concurrency_stamp: String,
    phone_number: Option<String>,
    phone_number_confirmed: bool,
    two_factor_enabled: bool,
    lockout_end: Option<DateTime<Utc>>,
    lockout_enabled: bool,
    access_failed_count: i32,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: UserId::from_uuid(self.id),
            user_name: self.user_name,
            normalized_user_name: self.normalized_user_name,
            email: self.email.map(Email::from_db),
            normalized_email: self.normalized_email,
            email_confirmed: self.email_confirmed,
            password_hash: self.password_hash,
            security_stamp: SecurityStamp::from_db(self.security_stamp),
            concurrency_stamp: ConcurrencyStamp::from_db(self.concurrency_stamp),
            phone_number: self.phone_number,
            phone_number_confirmed: self.phone_number_confirmed,
            two_factor_enabled: self.two_factor_enabled,
            lockout_end: self.lockout_end,
            lockout_enabled: self.lockout_enabled,
            access_failed_count: self.access_failed_count,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserLoginRow {
    login_provider: String,
    provider_key: String,
    provider_display_name: Option<String>,
    user_id: Uuid,
}

impl UserLoginRow {
    fn into_login(self) -> UserLogin {
        UserLogin {
            login_provider: self.login_provider,
            provider_key: self.provider_key,
            provider_display_name: self.provider_display_name,
            user_id: UserId::from_uuid(self.user_id),
        }
    }
}

/// Shared by `user_claims` and `role_claims`; `owner_id` is the user or
/// role the claim belongs to.
#[derive(sqlx::FromRow)]
struct ClaimRow {
    id: i32,
    owner_id: Uuid,
    claim_type: Option<String>,
    claim_value: Option<String>,
}

impl ClaimRow {
    fn into_user_claim(self) -> UserClaim {
        UserClaim {
            id: self.id,
            user_id: UserId::from_uuid(self.owner_id),
            claim_type: self.claim_type.unwrap_or_default(),
            claim_value: self.claim_value.unwrap_or_default(),
        }
    }

    fn into_role_claim(self) -> RoleClaim {
        RoleClaim {
            id: self.id,
            role_id: RoleId::from_uuid(self.owner_id),
            claim_type: self.claim_type.unwrap_or_default(),
            claim_value: self.claim_value.unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: Uuid,
    name: Option<String>,
    normalized_name: Option<String>,
    concurrency_stamp: String,
}

impl RoleRow {
    fn into_role(self) -> Role {
        Role {
            id: RoleId::from_uuid(self.id),
            name: self.name.unwrap_or_default(),
            normalized_name: self.normalized_name.unwrap_or_default(),
            concurrency_stamp: ConcurrencyStamp::from_db(self.concurrency_stamp),
        }
    }
}
