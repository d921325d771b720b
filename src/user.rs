use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::is_unique_violation,
    error::{Error, Result},
    utils::now,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

/// A user record. The password hash lives in the same table but is never loaded here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, ToSchema)]
pub struct User {
    pub id: i64,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(url)]
    pub image: Option<String>,
    pub role: Role,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewUser {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub role: Role,
    #[validate(url)]
    pub image: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
}

/// Profile fields a user may change; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(url)]
    pub image: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
}

const USER_COLUMNS: &str = "id, name, email, image, role, bio, created_at, updated_at";

pub async fn register_user(database: &SqlitePool, new: NewUser) -> Result<User> {
    new.validate()?;
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(new.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    let now = now();
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, image, role, bio, password_hash, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
    ))
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.image)
    .bind(new.role)
    .bind(&new.bio)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .fetch_one(database)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::EmailTaken
        } else {
            e.into()
        }
    })?;
    info!("registered {:?} {} ({})", user.role, user.id, user.email);
    Ok(user)
}

pub async fn login(database: &SqlitePool, email: &str, password: &str) -> Result<User> {
    let Some((id, password_hash)) =
        sqlx::query_as::<_, (i64, String)>("SELECT id, password_hash FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(database)
            .await?
    else {
        return Err(Error::InvalidCredentials);
    };
    let parsed_hash = PasswordHash::new(&password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| Error::InvalidCredentials)?;
    get_user(database, id).await
}

pub async fn get_user(database: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(database)
        .await?
        .ok_or(Error::UserNotFound)
}

pub async fn get_user_list(database: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
        .fetch_all(database)
        .await?;
    Ok(users)
}

pub async fn update_profile(database: &SqlitePool, id: i64, update: ProfileUpdate) -> Result<User> {
    update.validate()?;
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = COALESCE(?, name), image = COALESCE(?, image), \
         bio = COALESCE(?, bio), updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"
    ))
    .bind(update.name)
    .bind(update.image)
    .bind(update.bio)
    .bind(now())
    .bind(id)
    .fetch_optional(database)
    .await?
    .ok_or(Error::UserNotFound)
}

/// Load the user and make sure they may manage courses.
pub async fn require_instructor(database: &SqlitePool, id: i64) -> Result<User> {
    let user = get_user(database, id).await?;
    if user.role != Role::Instructor {
        return Err(Error::Forbidden);
    }
    Ok(user)
}
