//! Rows shared by the database tests

use sqlx::{Pool, Postgres};

use crate::{
    pagination::{PageRequest, Query},
    schema::{IngredientAmount, NewUser, RecipeData, UserRole, Uuid},
};

use super::{create_ingredient, create_recipe, register_user};

pub async fn user(pool: &Pool<Postgres>, username: &str) -> Uuid {
    let user = NewUser {
        email: format!("{username}@foodgram.test"),
        username: username.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        password: "not-hashed".to_string(),
    };
    register_user(pool, &user, UserRole::User).await.unwrap().id
}

pub async fn ingredient(pool: &Pool<Postgres>, name: &str, unit: &str) -> Uuid {
    create_ingredient(pool, name, unit).await.unwrap().id
}

pub async fn tag(pool: &Pool<Postgres>, slug: &str, color: &str) -> Uuid {
    let row: (Uuid,) =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING id")
            .bind(slug.to_uppercase())
            .bind(color)
            .bind(slug)
            .fetch_one(pool)
            .await
            .unwrap();
    row.0
}

pub async fn recipe(
    pool: &Pool<Postgres>,
    author: Uuid,
    name: &str,
    tags: &[Uuid],
    ingredients: &[(Uuid, i16)],
) -> Uuid {
    let data = RecipeData {
        name: Some(name.to_string()),
        image: Some(format!("recipes/{name}.png")),
        text: Some("Mix and serve.".to_string()),
        cooking_time: Some(10),
        tags: tags.to_vec(),
        ingredients: ingredients
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect(),
    };
    create_recipe(pool, author, &data).await.unwrap()
}

pub fn first_page(limit: i64) -> PageRequest {
    PageRequest::from_query(&Query::from_pairs(vec![]), limit, String::new()).unwrap()
}
