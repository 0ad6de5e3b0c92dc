use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, HtmlError, QueryError, NON_FIELD_ERRORS},
    schema::{BookmarkList, CompactRecipe, ShoppingListEntry, Uuid},
};

use super::recipes::get_compact_recipe;

pub const ALREADY_LISTED: &str = "The fields user, recipe must make a unique set.";

/// Adds the recipe to one of the user's lists. A missing recipe is a 404, a recipe
/// already on the list a 400.
pub async fn add_to_list(
    pool: &Pool<Postgres>,
    list: BookmarkList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<CompactRecipe, Error> {
    let recipe = get_compact_recipe(pool, recipe_id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::field(NON_FIELD_ERRORS, ALREADY_LISTED));
    }

    log::debug!("User {user_id} added recipe {recipe_id} to {}", list.table());
    Ok(recipe)
}

/// Removes the recipe from one of the user's lists, 404 when the recipe or the entry is missing
pub async fn remove_from_list(
    pool: &Pool<Postgres>,
    list: BookmarkList,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<(), Error> {
    if get_compact_recipe(pool, recipe_id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }

    log::debug!("User {user_id} removed recipe {recipe_id} from {}", list.table());
    Ok(())
}

/// Ingredients of every recipe in the user's shopping list, amounts summed per
/// (name, measurement unit)
pub async fn list_shopping_list(
    pool: &Pool<Postgres>,
    user_id: Uuid,
) -> Result<Vec<ShoppingListEntry>, Error> {
    let rows: Vec<ShoppingListEntry> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, SUM(iq.amount)::BIGINT AS amount
        FROM shopping_lists l
        INNER JOIN ingredient_quantities iq ON iq.recipe_id = l.recipe_id
        INNER JOIN ingredients i ON i.id = iq.ingredient_id
        WHERE l.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::actions::fixtures;

    #[sqlx::test]
    async fn duplicates_are_rejected_per_list(pool: PgPool) {
        let author = fixtures::user(&pool, "author").await;
        let reader = fixtures::user(&pool, "reader").await;
        let recipe = fixtures::recipe(&pool, author, "porridge", &[], &[]).await;

        for list in [BookmarkList::Favourites, BookmarkList::ShoppingCart] {
            let added = add_to_list(&pool, list, reader, recipe).await.unwrap();
            assert_eq!(added.id, recipe);
            assert_eq!(added.name, "porridge");

            let err = add_to_list(&pool, list, reader, recipe).await.unwrap_err();
            assert_eq!(err.code, 400);
            assert_eq!(err.fields.unwrap()[NON_FIELD_ERRORS], vec![ALREADY_LISTED]);
        }

        // Lists of other users are independent
        add_to_list(&pool, BookmarkList::Favourites, author, recipe).await.unwrap();
    }

    #[sqlx::test]
    async fn missing_entries_and_recipes_are_not_found(pool: PgPool) {
        let author = fixtures::user(&pool, "author").await;
        let recipe = fixtures::recipe(&pool, author, "porridge", &[], &[]).await;

        let err = add_to_list(&pool, BookmarkList::Favourites, author, recipe + 1)
            .await
            .unwrap_err();
        assert_eq!(err.code, 404);

        let err = remove_from_list(&pool, BookmarkList::ShoppingCart, author, recipe)
            .await
            .unwrap_err();
        assert_eq!(err.code, 404);

        let err = remove_from_list(&pool, BookmarkList::ShoppingCart, author, recipe + 1)
            .await
            .unwrap_err();
        assert_eq!(err.code, 404);

        add_to_list(&pool, BookmarkList::ShoppingCart, author, recipe).await.unwrap();
        remove_from_list(&pool, BookmarkList::ShoppingCart, author, recipe).await.unwrap();
        let err = remove_from_list(&pool, BookmarkList::ShoppingCart, author, recipe)
            .await
            .unwrap_err();
        assert_eq!(err.code, 404);
    }

    #[sqlx::test]
    async fn shopping_list_sums_amounts(pool: PgPool) {
        let author = fixtures::user(&pool, "author").await;
        let flour = fixtures::ingredient(&pool, "flour", "g").await;
        let eggs = fixtures::ingredient(&pool, "eggs", "pcs").await;
        let milk = fixtures::ingredient(&pool, "milk", "ml").await;
        let milk_cups = fixtures::ingredient(&pool, "milk", "cup").await;

        let pancakes =
            fixtures::recipe(&pool, author, "pancakes", &[], &[(flour, 200), (eggs, 2), (milk, 300)])
                .await;
        let bread = fixtures::recipe(&pool, author, "bread", &[], &[(flour, 500), (milk_cups, 1)])
            .await;
        // Not in the cart
        fixtures::recipe(&pool, author, "omelette", &[], &[(eggs, 3)]).await;

        assert!(list_shopping_list(&pool, author).await.unwrap().is_empty());

        for recipe in [pancakes, bread] {
            add_to_list(&pool, BookmarkList::ShoppingCart, author, recipe).await.unwrap();
        }
        // Favourites do not count
        add_to_list(&pool, BookmarkList::Favourites, author, pancakes).await.unwrap();

        let entry = |name: &str, unit: &str, amount| ShoppingListEntry {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        };
        assert_eq!(
            list_shopping_list(&pool, author).await.unwrap(),
            vec![
                entry("eggs", "pcs", 2),
                entry("flour", "g", 700),
                entry("milk", "cup", 1),
                entry("milk", "ml", 300),
            ]
        );
    }
}
