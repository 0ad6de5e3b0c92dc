use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, HtmlError, QueryError, NON_FIELD_ERRORS},
    pagination::{Page, PageRequest},
    schema::{AuthorRecipe, CompactRecipe, SubscriptionProfile, UserProfile, UserProfileRow, Uuid},
};

use super::users::user_exists;

pub const SELF_SUBSCRIPTION: &str = "You cannot subscribe to yourself!";
pub const ALREADY_SUBSCRIBED: &str = "You are already subscribed to this author.";

pub async fn subscribe(pool: &Pool<Postgres>, user_id: Uuid, author_id: Uuid) -> Result<(), Error> {
    if !user_exists(pool, author_id).await? {
        return Err(HtmlError::NotFound.default());
    }
    if user_id == author_id {
        return Err(Error::field(NON_FIELD_ERRORS, SELF_SUBSCRIPTION));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::field(NON_FIELD_ERRORS, ALREADY_SUBSCRIBED));
    }

    log::debug!("User {user_id} subscribed to {author_id}");
    Ok(())
}

pub async fn unsubscribe(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    author_id: Uuid,
) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }

    log::debug!("User {user_id} unsubscribed from {author_id}");
    Ok(())
}

/// Newest recipes per author, at most `recipes_limit` each when given
pub async fn list_author_recipes(
    pool: &Pool<Postgres>,
    author_ids: &[Uuid],
    recipes_limit: Option<i64>,
) -> Result<HashMap<Uuid, Vec<CompactRecipe>>, Error> {
    let rows: Vec<AuthorRecipe> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM (
            SELECT r.author_id, r.id, r.name, r.image, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, position
    ",
    )
    .bind(author_ids)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Uuid, Vec<CompactRecipe>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.author_id).or_default().push(row.into());
    });

    Ok(hashmap)
}

fn into_profiles(
    rows: Vec<UserProfileRow>,
    mut recipes: HashMap<Uuid, Vec<CompactRecipe>>,
) -> Vec<SubscriptionProfile> {
    rows.into_iter()
        .map(|row| SubscriptionProfile {
            recipes: recipes.remove(&row.id).unwrap_or_default(),
            recipes_count: row.recipes_count,
            user: UserProfile::from(row),
        })
        .collect()
}

pub async fn list_subscriptions(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    recipes_limit: Option<i64>,
    request: &PageRequest,
) -> Result<Page<SubscriptionProfile>, Error> {
    let rows: Vec<UserProfileRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            TRUE AS is_subscribed,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(request.limit)
    .bind(request.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let author_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let recipes = list_author_recipes(pool, &author_ids, recipes_limit).await?;

    Page::from_rows(into_profiles(rows, recipes), total_count, request)
}

pub async fn get_subscription_profile(
    pool: &Pool<Postgres>,
    viewer: Uuid,
    author_id: Uuid,
    recipes_limit: Option<i64>,
) -> Result<SubscriptionProfile, Error> {
    let row: Option<UserProfileRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS(SELECT 1 FROM subscriptions s WHERE s.user_id = $2 AND s.author_id = u.id) AS is_subscribed,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            1::BIGINT AS count
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(author_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    let row = row.ok_or_else(|| HtmlError::NotFound.default())?;
    let recipes = list_author_recipes(pool, &[author_id], recipes_limit).await?;

    into_profiles(vec![row], recipes)
        .pop()
        .ok_or_else(|| HtmlError::NotFound.default())
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::actions::fixtures;

    #[sqlx::test]
    async fn subscription_rules(pool: PgPool) {
        let reader = fixtures::user(&pool, "reader").await;
        let author = fixtures::user(&pool, "author").await;

        let err = subscribe(&pool, reader, reader).await.unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.fields.unwrap()[NON_FIELD_ERRORS], vec![SELF_SUBSCRIPTION]);

        let err = subscribe(&pool, reader, author + 100).await.unwrap_err();
        assert_eq!(err.code, 404);

        subscribe(&pool, reader, author).await.unwrap();
        let err = subscribe(&pool, reader, author).await.unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.fields.unwrap()[NON_FIELD_ERRORS], vec![ALREADY_SUBSCRIBED]);

        unsubscribe(&pool, reader, author).await.unwrap();
        let err = unsubscribe(&pool, reader, author).await.unwrap_err();
        assert_eq!(err.code, 404);
    }

    #[sqlx::test]
    async fn recipes_limit_keeps_the_full_count(pool: PgPool) {
        let reader = fixtures::user(&pool, "reader").await;
        let author = fixtures::user(&pool, "author").await;
        let quiet = fixtures::user(&pool, "quiet").await;

        let mut recipes = Vec::new();
        for name in ["soup", "salad", "stew"] {
            recipes.push(fixtures::recipe(&pool, author, name, &[], &[]).await);
        }
        for followed in [author, quiet] {
            subscribe(&pool, reader, followed).await.unwrap();
        }

        let profile = get_subscription_profile(&pool, reader, author, Some(2)).await.unwrap();
        assert!(profile.user.is_subscribed);
        assert_eq!(profile.recipes_count, 3);
        let ids: Vec<Uuid> = profile.recipes.iter().map(|recipe| recipe.id).collect();
        assert_eq!(ids, vec![recipes[2], recipes[1]]);

        let profile = get_subscription_profile(&pool, quiet, author, None).await.unwrap();
        assert!(!profile.user.is_subscribed);
        assert_eq!(profile.recipes.len(), 3);

        let err = get_subscription_profile(&pool, reader, author + 100, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, 404);

        let page = list_subscriptions(&pool, reader, Some(1), &fixtures::first_page(6))
            .await
            .unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.results[0].user.id, author);
        assert_eq!(page.results[0].recipes.len(), 1);
        assert_eq!(page.results[0].recipes[0].id, recipes[2]);
        assert_eq!(page.results[0].recipes_count, 3);
        assert_eq!(page.results[1].user.id, quiet);
        assert!(page.results[1].recipes.is_empty());
        assert_eq!(page.results[1].recipes_count, 0);
    }
}
