//! Connection pool, migrations and lookups shared across handlers.

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::models::{Contact, Notification, NotificationType, User, UserRole};

/// Open the pool and apply pending migrations.
///
/// In-memory databases get a single connection so every query sees the same
/// schema.
///
/// # Errors
///
/// Returns an error if the URL is invalid, the database cannot be opened or a
/// migration fails.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(max_connections, "Database ready");
    Ok(pool)
}

pub async fn find_user(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Oldest active user with `role`; used as the default owner of inbound leads.
pub async fn first_active_user_with_role(
    pool: &SqlitePool,
    role: UserRole,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE role = ? AND is_active = 1 ORDER BY id LIMIT 1")
        .bind(role)
        .fetch_optional(pool)
        .await
}

/// Insert a user with an already hashed password.
pub async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    password_hash: &str,
    role: UserRole,
) -> ApiResult<User> {
    if find_user_by_email(pool, email).await?.is_some() {
        return Err(ApiError::bad_request("Email already registered"));
    }

    let now = Utc::now();
    let user = sqlx::query_as(
        "INSERT INTO users (email, name, password_hash, role, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 1, ?, ?) RETURNING *",
    )
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(role)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn find_contact(pool: &SqlitePool, id: i64) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM contacts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Contact by email, case-insensitive.
pub async fn find_contact_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM contacts WHERE lower(email) = lower(?) ORDER BY id LIMIT 1")
        .bind(email.trim())
        .fetch_optional(pool)
        .await
}

/// Contact visible to the caller, 404 otherwise.
pub async fn visible_contact(pool: &SqlitePool, user: &User, id: i64) -> ApiResult<Contact> {
    find_contact(pool, id)
        .await?
        .filter(|c| user.owner_scope().is_none_or(|owner| c.owner_id == owner))
        .ok_or_else(|| ApiError::not_found("Contact not found"))
}

/// Everything needed to create a notification.
#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
    pub recipient_id: i64,
    pub title: &'a str,
    pub message: &'a str,
    pub notification_type: NotificationType,
    pub related_entity: Option<(&'a str, i64)>,
}

pub async fn insert_notification(
    pool: &SqlitePool,
    new: NewNotification<'_>,
) -> Result<Notification, sqlx::Error> {
    debug!(recipient_id = new.recipient_id, title = %new.title, "Creating notification");
    let (entity_type, entity_id) = new.related_entity.unzip();
    sqlx::query_as(
        "INSERT INTO notifications \
         (title, message, type, recipient_id, related_entity_type, related_entity_id, is_read, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, 0, ?) RETURNING *",
    )
    .bind(new.title)
    .bind(new.message)
    .bind(new.notification_type)
    .bind(new.recipient_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

/// `LIKE` pattern matching `term` anywhere, with wildcards escaped.
#[must_use]
pub fn contains_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
