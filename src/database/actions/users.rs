use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionKeys},
    },
    database::{
        error::QueryError,
        pagination::{PageContext, PageRequest},
        payload::NewUser,
    },
    error::{Error, HtmlError},
    schema::{Id, User, UserProfile, UserRow},
};

const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// `viewer` decides `is_subscribed`; anonymous viewers are never subscribed.
pub async fn get_profile(
    pool: &Pool<Postgres>,
    user_id: Id,
    viewer: Option<Id>,
) -> Result<Option<UserProfile>, Error> {
    let row: Option<UserProfile> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS(
                SELECT 1 FROM subscriptions s WHERE s.user_id = $2 AND s.author_id = u.id
            ) AS is_subscribed
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(user_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_profiles(
    pool: &Pool<Postgres>,
    user_ids: &[Id],
    viewer: Option<Id>,
) -> Result<Vec<UserProfile>, Error> {
    let rows: Vec<UserProfile> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS(
                SELECT 1 FROM subscriptions s WHERE s.user_id = $2 AND s.author_id = u.id
            ) AS is_subscribed
        FROM users u
        WHERE u.id = ANY($1)
    ",
    )
    .bind(user_ids)
    .bind(viewer)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn fetch_users(
    pool: &Pool<Postgres>,
    viewer: Option<Id>,
    page: &PageRequest,
) -> Result<PageContext<UserProfile>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS(
                SELECT 1 FROM subscriptions s WHERE s.user_id = $1 AND s.author_id = u.id
            ) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows = rows.into_iter().map(UserProfile::from).collect();

    PageContext::from_rows(rows, total_count, page)
}

/// Hashes the password and inserts the user; duplicate email or username is a field error.
pub async fn register_user(pool: &Pool<Postgres>, user: NewUser) -> Result<User, Error> {
    let password = hash_password(&user.password)?;

    let row: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Registered user {} ({})", row.username, row.id);
    Ok(row)
}

/// Returns a signed session token for valid credentials.
pub async fn login_user(
    pool: &Pool<Postgres>,
    keys: &SessionKeys,
    email: &str,
    password: &str,
) -> Result<String, Error> {
    let Some(user) = get_user_by_email(pool, email).await? else {
        return Err(HtmlError::InvalidRequest.new(INVALID_CREDENTIALS));
    };

    if !verify_password(password, &user.password) {
        return Err(HtmlError::InvalidRequest.new(INVALID_CREDENTIALS));
    }

    log::debug!("User {} logged in", user.id);
    generate_jwt_session(keys, &user)
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Id,
    current_password: &str,
    new_password: &str,
) -> Result<(), Error> {
    let Some(user) = get_user_by_id(pool, user_id).await? else {
        return Err(HtmlError::NotFound.default());
    };

    if !verify_password(current_password, &user.password) {
        return Err(Error::field("current_password", "Wrong password."));
    }

    let password = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
