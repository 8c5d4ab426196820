use crate::{
    authentication::cryptography::{hash_password, password_matches},
    error::{ApiError, FieldErrors},
    form::UserPayload,
    schema::{User, UserListRow, Uuid},
};

use sqlx::{Pool, Postgres};

const EMAIL_TAKEN: &str = "user with this email already exists.";

pub async fn get_user(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

async fn email_taken(
    pool: &Pool<Postgres>,
    email: &str,
    except: Option<Uuid>,
) -> Result<bool, ApiError> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 AND ($2::INTEGER IS NULL OR id <> $2)")
            .bind(email)
            .bind(except)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

/// Creates a user. The payload must have been validated as a full (non partial) form.
pub async fn register_user(payload: UserPayload, pool: &Pool<Postgres>) -> Result<User, ApiError> {
    let (Some(email), Some(password), Some(name)) = (payload.email, payload.password, payload.name)
    else {
        return Err(ApiError::Internal(String::from(
            "user payload validated without required fields",
        )));
    };

    if email_taken(pool, &email, None).await? {
        return Err(FieldErrors::single("email", EMAIL_TAKEN).into());
    }

    let password = hash_password(password).await?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, name, password)
        VALUES ($1, $2, $3)
        RETURNING *;
    ",
    )
    .bind(&email)
    .bind(name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(|e| match ApiError::from(e) {
        e if e.is_unique_violation() => FieldErrors::single("email", EMAIL_TAKEN).into(),
        e => e,
    })?;

    log::info!("> Registered user {}", user.id);
    Ok(user)
}

/// Returns the user when the credentials match an active account.
pub async fn authenticate_user(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, ApiError> {
    let user = match get_user(pool, email).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    let authenticated = password_matches(password.to_string(), user.password.clone()).await?;

    if !authenticated || !user.is_active {
        return Ok(None);
    }

    Ok(Some(user))
}

/// Applies the present fields of `payload` to the user. A new password is re-hashed.
pub async fn update_user(
    user_id: Uuid,
    payload: UserPayload,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, ApiError> {
    if let Some(email) = &payload.email {
        if email_taken(pool, email, Some(user_id)).await? {
            return Err(FieldErrors::single("email", EMAIL_TAKEN).into());
        }
    }

    let password = match payload.password {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let user: Option<User> = sqlx::query_as(
        "
        UPDATE users SET
        email = COALESCE($1, email),
        name = COALESCE($2, name),
        password = COALESCE($3, password)
        WHERE id = $4
        RETURNING *;
    ",
    )
    .bind(payload.email)
    .bind(payload.name)
    .bind(password)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| match ApiError::from(e) {
        e if e.is_unique_violation() => FieldErrors::single("email", EMAIL_TAKEN).into(),
        e => e,
    })?;

    Ok(user)
}

pub async fn list_users(pool: &Pool<Postgres>) -> Result<Vec<UserListRow>, ApiError> {
    let rows: Vec<UserListRow> = sqlx::query_as("SELECT id, email, name FROM users ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
