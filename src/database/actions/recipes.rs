use std::collections::HashMap;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    error::{Error, HtmlError, QueryError},
    pagination::{Page, PageRequest},
    schema::{
        BookmarkList, CompactRecipe, Recipe, RecipeData, RecipeDetail, RecipeFilter, RecipePart,
        RecipePartNoId, RecipeRow, RecipeTagRow, Tag, UserProfile, Uuid,
    },
};

/// Recipe rows joined with their author and the flags relative to `viewer`
fn recipe_query<'a>(viewer: Option<Uuid>) -> QueryBuilder<'a, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "
        SELECT r.id, r.name, r.image, r.text, r.cooking_time,
            u.id AS author_id,
            u.email AS author_email,
            u.username AS author_username,
            u.first_name AS author_first_name,
            u.last_name AS author_last_name,
            EXISTS(SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = ",
    );
    query_builder.push_bind(viewer);
    query_builder.push(
        ") AS author_is_subscribed,
            EXISTS(SELECT 1 FROM favourites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    query_builder.push_bind(viewer);
    query_builder.push(
        ") AS is_favorited,
            EXISTS(SELECT 1 FROM shopping_lists l WHERE l.recipe_id = r.id AND l.user_id = ",
    );
    query_builder.push_bind(viewer);
    query_builder.push(
        ") AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM recipes r
        INNER JOIN users u ON u.id = r.author_id
        WHERE TRUE",
    );

    query_builder
}

pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    viewer: Option<Uuid>,
    filter: &RecipeFilter,
    request: &PageRequest,
) -> Result<Page<RecipeDetail>, Error> {
    let mut query_builder = recipe_query(viewer);

    if !filter.tags.is_empty() {
        query_builder.push(
            " AND EXISTS(
                SELECT 1 FROM recipe_tags rt
                INNER JOIN tags t ON t.id = rt.tag_id
                WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        query_builder.push_bind(filter.tags.clone());
        query_builder.push("))");
    }

    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ");
        query_builder.push_bind(author);
    }

    for (enabled, list) in [
        (filter.is_favorited, BookmarkList::Favourites),
        (filter.is_in_shopping_cart, BookmarkList::ShoppingCart),
    ] {
        if !enabled {
            continue;
        }
        // Anonymous requesters have no lists
        let Some(viewer) = viewer else {
            return Page::from_rows(vec![], 0, request);
        };
        query_builder.push(format!(
            " AND EXISTS(SELECT 1 FROM {} b WHERE b.recipe_id = r.id AND b.user_id = ",
            list.table()
        ));
        query_builder.push_bind(viewer);
        query_builder.push(")");
    }

    query_builder.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ");
    query_builder.push_bind(request.limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(request.offset());

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as::<RecipeRow>()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let details = into_details(pool, rows).await?;

    Page::from_rows(details, total_count, request)
}

pub async fn get_recipe_detail(
    pool: &Pool<Postgres>,
    viewer: Option<Uuid>,
    id: Uuid,
) -> Result<Option<RecipeDetail>, Error> {
    let mut query_builder = recipe_query(viewer);
    query_builder.push(" AND r.id = ");
    query_builder.push_bind(id);

    let row: Option<RecipeRow> = query_builder
        .build_query_as::<RecipeRow>()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(into_details(pool, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn into_details(
    pool: &Pool<Postgres>,
    rows: Vec<RecipeRow>,
) -> Result<Vec<RecipeDetail>, Error> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut tags = list_recipe_tags(pool, &ids).await?;
    let mut parts = list_recipe_parts(pool, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| RecipeDetail {
            id: row.id,
            tags: tags.remove(&row.id).unwrap_or_default(),
            author: UserProfile {
                email: row.author_email,
                id: row.author_id,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                is_subscribed: row.author_is_subscribed,
            },
            ingredients: parts.remove(&row.id).unwrap_or_default(),
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name,
            image: row.image,
            text: row.text,
            cooking_time: row.cooking_time,
        })
        .collect())
}

pub async fn list_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Tag>>, Error> {
    let rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    rows.into_iter().for_each(|x| match hashmap.get_mut(&x.recipe_id) {
        Some(v) => v.push(x.into()),
        None => {
            hashmap.insert(x.recipe_id, vec![x.into()]);
        }
    });

    Ok(hashmap)
}

pub async fn list_recipe_parts(
    pool: &Pool<Postgres>,
    recipe_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<RecipePartNoId>>, Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT iq.recipe_id, i.id, i.name, i.measurement_unit, iq.amount
        FROM ingredient_quantities iq
        INNER JOIN ingredients i ON i.id = iq.ingredient_id
        WHERE iq.recipe_id = ANY($1)
        ORDER BY iq.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Uuid, Vec<RecipePartNoId>> = HashMap::new();
    rows.into_iter().for_each(|x| match hashmap.get_mut(&x.recipe_id) {
        Some(v) => v.push(x.into()),
        None => {
            hashmap.insert(x.recipe_id, vec![x.into()]);
        }
    });

    Ok(hashmap)
}

pub async fn get_recipe(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_compact_recipe(
    pool: &Pool<Postgres>,
    id: Uuid,
) -> Result<Option<CompactRecipe>, Error> {
    let row: Option<CompactRecipe> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

async fn insert_recipe_links(
    transaction: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    data: &RecipeData,
) -> Result<(), Error> {
    if !data.tags.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

        query_builder.push_values(data.tags.iter().take(65535 / 2), |mut b, tag_id| {
            b.push_bind(recipe_id).push_bind(*tag_id);
        });

        query_builder
            .build()
            .execute(&mut **transaction)
            .await
            .map_err(QueryError::from)?;
    }

    if !data.ingredients.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO ingredient_quantities (recipe_id, ingredient_id, amount) ",
        );

        query_builder.push_values(data.ingredients.iter().take(65535 / 3), |mut b, part| {
            b.push_bind(recipe_id)
                .push_bind(part.id)
                .push_bind(part.amount);
        });

        query_builder
            .build()
            .execute(&mut **transaction)
            .await
            .map_err(QueryError::from)?;
    }

    Ok(())
}

/// Creates the recipe with its tags and ingredient quantities in one transaction
pub async fn create_recipe(
    pool: &Pool<Postgres>,
    author_id: Uuid,
    data: &RecipeData,
) -> Result<Uuid, Error> {
    let (Some(name), Some(image), Some(text), Some(cooking_time)) =
        (&data.name, &data.image, &data.text, data.cooking_time)
    else {
        return Err(HtmlError::InvalidRequest.default());
    };

    let mut transaction = pool.begin().await.map_err(QueryError::from)?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(name)
    .bind(image)
    .bind(text)
    .bind(cooking_time)
    .fetch_one(&mut *transaction)
    .await
    .map_err(QueryError::from)?;

    insert_recipe_links(&mut transaction, id.0, data).await?;
    transaction.commit().await.map_err(QueryError::from)?;

    log::info!("User {author_id} created recipe {}", id.0);

    Ok(id.0)
}

/// Updates the given fields and replaces the tag and ingredient sets
pub async fn update_recipe(pool: &Pool<Postgres>, id: Uuid, data: &RecipeData) -> Result<(), Error> {
    let mut transaction = pool.begin().await.map_err(QueryError::from)?;

    let result = sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($1, name),
            image = COALESCE($2, image),
            text = COALESCE($3, text),
            cooking_time = COALESCE($4, cooking_time)
        WHERE id = $5
    ",
    )
    .bind(&data.name)
    .bind(&data.image)
    .bind(&data.text)
    .bind(data.cooking_time)
    .bind(id)
    .execute(&mut *transaction)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *transaction)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM ingredient_quantities WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *transaction)
        .await
        .map_err(QueryError::from)?;

    insert_recipe_links(&mut transaction, id, data).await?;
    transaction.commit().await.map_err(QueryError::from)?;

    log::info!("Updated recipe {id}");

    Ok(())
}

pub async fn delete_recipe(pool: &Pool<Postgres>, id: Uuid) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }

    log::info!("Deleted recipe {id}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::actions::{add_to_list, fixtures};

    fn ids(page: &Page<RecipeDetail>) -> Vec<Uuid> {
        page.results.iter().map(|recipe| recipe.id).collect()
    }

    #[sqlx::test]
    async fn recipes_are_filtered(pool: PgPool) {
        let alice = fixtures::user(&pool, "alice").await;
        let bob = fixtures::user(&pool, "bob").await;
        let breakfast = fixtures::tag(&pool, "breakfast", "#E26C2D").await;
        let dinner = fixtures::tag(&pool, "dinner", "#49B64E").await;

        let porridge = fixtures::recipe(&pool, alice, "porridge", &[breakfast], &[]).await;
        let stew = fixtures::recipe(&pool, alice, "stew", &[dinner], &[]).await;
        let toast = fixtures::recipe(&pool, bob, "toast", &[breakfast, dinner], &[]).await;
        let request = fixtures::first_page(6);

        let page = fetch_recipes(&pool, None, &RecipeFilter::default(), &request)
            .await
            .unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(ids(&page), vec![toast, stew, porridge]);

        let filter = RecipeFilter {
            tags: vec!["breakfast".to_string()],
            ..Default::default()
        };
        let page = fetch_recipes(&pool, None, &filter, &request).await.unwrap();
        assert_eq!(ids(&page), vec![toast, porridge]);

        // Any of the given tags matches, each recipe once
        let filter = RecipeFilter {
            tags: vec!["breakfast".to_string(), "dinner".to_string()],
            ..Default::default()
        };
        let page = fetch_recipes(&pool, None, &filter, &request).await.unwrap();
        assert_eq!(page.count, 3);

        let filter = RecipeFilter {
            tags: vec!["dinner".to_string()],
            author: Some(alice),
            ..Default::default()
        };
        let page = fetch_recipes(&pool, None, &filter, &request).await.unwrap();
        assert_eq!(ids(&page), vec![stew]);
    }

    #[sqlx::test]
    async fn personal_lists_filter_by_viewer(pool: PgPool) {
        let alice = fixtures::user(&pool, "alice").await;
        let bob = fixtures::user(&pool, "bob").await;
        let porridge = fixtures::recipe(&pool, alice, "porridge", &[], &[]).await;
        let stew = fixtures::recipe(&pool, alice, "stew", &[], &[]).await;
        let request = fixtures::first_page(6);

        add_to_list(&pool, BookmarkList::Favourites, bob, porridge).await.unwrap();
        add_to_list(&pool, BookmarkList::ShoppingCart, bob, stew).await.unwrap();

        let favourites = RecipeFilter {
            is_favorited: true,
            ..Default::default()
        };
        let page = fetch_recipes(&pool, Some(bob), &favourites, &request).await.unwrap();
        assert_eq!(ids(&page), vec![porridge]);
        assert!(page.results[0].is_favorited);
        assert!(!page.results[0].is_in_shopping_cart);

        let cart = RecipeFilter {
            is_in_shopping_cart: true,
            ..Default::default()
        };
        let page = fetch_recipes(&pool, Some(bob), &cart, &request).await.unwrap();
        assert_eq!(ids(&page), vec![stew]);

        let page = fetch_recipes(&pool, Some(alice), &favourites, &request).await.unwrap();
        assert_eq!(page.count, 0);

        // Anonymous requesters get an empty page
        let page = fetch_recipes(&pool, None, &favourites, &request).await.unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
    }

    #[sqlx::test]
    async fn details_carry_tags_and_ingredients(pool: PgPool) {
        let alice = fixtures::user(&pool, "alice").await;
        let breakfast = fixtures::tag(&pool, "breakfast", "#E26C2D").await;
        let oats = fixtures::ingredient(&pool, "oats", "g").await;
        let porridge =
            fixtures::recipe(&pool, alice, "porridge", &[breakfast], &[(oats, 80)]).await;

        let detail = get_recipe_detail(&pool, Some(alice), porridge).await.unwrap().unwrap();
        assert_eq!(detail.author.id, alice);
        assert_eq!(detail.tags.len(), 1);
        assert_eq!(detail.tags[0].slug, "breakfast");
        assert_eq!(detail.ingredients.len(), 1);
        assert_eq!(detail.ingredients[0].amount, 80);
        assert!(!detail.is_favorited);

        assert!(get_recipe_detail(&pool, None, porridge + 1).await.unwrap().is_none());
    }
}
