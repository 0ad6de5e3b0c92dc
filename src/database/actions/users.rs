use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{cryptography::verify_password, jwt::generate_jwt_session},
    error::{Error, HtmlError, QueryError, NON_FIELD_ERRORS},
    pagination::{Page, PageRequest},
    schema::{NewUser, User, UserProfile, UserRole, Uuid},
};

pub const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn user_exists(pool: &Pool<Postgres>, user_id: Uuid) -> Result<bool, Error> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.0)
}

/// Returns whether the email and the username are already in use
pub async fn find_taken_credentials(
    pool: &Pool<Postgres>,
    email: &str,
    username: &str,
) -> Result<(bool, bool), Error> {
    let row: (bool, bool) = sqlx::query_as(
        "
        SELECT
            EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1)),
            EXISTS(SELECT 1 FROM users WHERE username = $2)
    ",
    )
    .bind(email)
    .bind(username)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a user, `user.password` must already be hashed
pub async fn register_user(
    pool: &Pool<Postgres>,
    user: &NewUser,
    role: UserRole,
) -> Result<User, Error> {
    let row: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Registered user {} ({})", row.username, row.id);

    Ok(row)
}

pub async fn login_user(
    pool: &Pool<Postgres>,
    email: &str,
    password: &str,
    secret: &str,
    lifetime: Duration,
) -> Result<String, Error> {
    let user = get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| Error::field(NON_FIELD_ERRORS, INVALID_CREDENTIALS))?;

    let authenticated = verify_password(password, &user.password).map_err(|e| {
        log::error!("Stored password of user {} is unreadable: {e}", user.id);
        HtmlError::InternalServerError.default()
    })?;
    if !authenticated {
        return Err(Error::field(NON_FIELD_ERRORS, INVALID_CREDENTIALS));
    }

    generate_jwt_session(&user, secret, lifetime)
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), Error> {
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn set_role(pool: &Pool<Postgres>, user_id: Uuid, role: UserRole) -> Result<(), Error> {
    let result = sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
        .bind(role)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }
    Ok(())
}

/// `viewer` decides `is_subscribed`, anonymous viewers are never subscribed
pub async fn get_user_profile(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Option<UserProfile>, Error> {
    let row: Option<UserProfile> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS(SELECT 1 FROM subscriptions s WHERE s.user_id = $2 AND s.author_id = u.id) AS is_subscribed
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

#[derive(sqlx::FromRow)]
struct UserListRow {
    #[sqlx(flatten)]
    profile: UserProfile,
    count: i64,
}

pub async fn list_users(
    pool: &Pool<Postgres>,
    viewer: Option<Uuid>,
    request: &PageRequest,
) -> Result<Page<UserProfile>, Error> {
    let rows: Vec<UserListRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS(SELECT 1 FROM subscriptions s WHERE s.user_id = $1 AND s.author_id = u.id) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer)
    .bind(request.limit)
    .bind(request.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let page = Page::from_rows(rows, total_count, request)?;

    Ok(page.map(|row| row.profile))
}

/// Returns whether the token id is revoked and the stored role of its user,
/// `None` when the user no longer exists
pub async fn session_status(
    pool: &Pool<Postgres>,
    jti: &str,
    user_id: Uuid,
) -> Result<(bool, Option<UserRole>), Error> {
    let row: (bool, Option<UserRole>) = sqlx::query_as(
        "
        SELECT
            EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1),
            (SELECT role FROM users WHERE id = $2)
    ",
    )
    .bind(jti)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

/// Revokes a token until it would have expired anyway, pruning revocations that no longer matter
pub async fn revoke_token(pool: &Pool<Postgres>, jti: &str, expires_at: i64) -> Result<(), Error> {
    let mut transaction = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
        .bind(Utc::now().timestamp())
        .execute(&mut *transaction)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(jti)
        .bind(expires_at)
        .execute(&mut *transaction)
        .await
        .map_err(QueryError::from)?;

    transaction.commit().await.map_err(QueryError::from)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::actions::fixtures;

    #[sqlx::test]
    async fn session_status_follows_stored_role(pool: PgPool) {
        let user = fixtures::user(&pool, "alice").await;
        let expires_at = (Utc::now() + Duration::hours(1)).timestamp();

        assert_eq!(
            session_status(&pool, "a", user).await.unwrap(),
            (false, Some(UserRole::User))
        );

        set_role(&pool, user, UserRole::Admin).await.unwrap();
        revoke_token(&pool, "a", expires_at).await.unwrap();
        assert_eq!(
            session_status(&pool, "a", user).await.unwrap(),
            (true, Some(UserRole::Admin))
        );
        assert_eq!(
            session_status(&pool, "b", user).await.unwrap(),
            (false, Some(UserRole::Admin))
        );

        assert_eq!(session_status(&pool, "b", user + 1).await.unwrap(), (false, None));
        assert_eq!(set_role(&pool, user + 1, UserRole::Admin).await.unwrap_err().code, 404);
    }

    #[sqlx::test]
    async fn users_are_listed_as_profiles(pool: PgPool) {
        let alice = fixtures::user(&pool, "alice").await;
        let bob = fixtures::user(&pool, "bob").await;
        fixtures::user(&pool, "carol").await;
        sqlx::query("INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2)")
            .bind(alice)
            .bind(bob)
            .execute(&pool)
            .await
            .unwrap();

        let page = list_users(&pool, Some(alice), &fixtures::first_page(2)).await.unwrap();
        assert_eq!(page.count, 3);
        assert!(page.next.is_some());
        let subscribed: Vec<(Uuid, bool)> = page
            .results
            .iter()
            .map(|profile| (profile.id, profile.is_subscribed))
            .collect();
        assert_eq!(subscribed, vec![(alice, false), (bob, true)]);

        let page = list_users(&pool, None, &fixtures::first_page(6)).await.unwrap();
        assert!(page.results.iter().all(|profile| !profile.is_subscribed));
    }
}
