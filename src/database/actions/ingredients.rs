use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::{Ingredient, Uuid},
};

/// Ingredients whose name contains `search`, case-insensitively. Names starting with
/// `search` come first.
pub async fn list_ingredients(
    pool: &Pool<Postgres>,
    search: Option<&str>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match search.filter(|search| !search.is_empty()) {
        Some(search) => sqlx::query_as(
            "
            SELECT * FROM ingredients
            WHERE name ILIKE '%' || $1 || '%'
            ORDER BY (name ILIKE $1 || '%') DESC, name, measurement_unit
        ",
        )
        .bind(escape_like(search))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name, measurement_unit")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredient(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn find_missing_ingredients(
    pool: &Pool<Postgres>,
    ids: &[Uuid],
) -> Result<Vec<Uuid>, Error> {
    let existing: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(ids
        .iter()
        .filter(|id| !existing.iter().any(|row| row.0 == **id))
        .copied()
        .collect())
}

pub async fn ingredient_exists(
    pool: &Pool<Postgres>,
    name: &str,
    measurement_unit: &str,
) -> Result<bool, Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM ingredients WHERE name = $1 AND measurement_unit = $2)",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.0)
}

pub async fn create_ingredient(
    pool: &Pool<Postgres>,
    name: &str,
    measurement_unit: &str,
) -> Result<Ingredient, Error> {
    let row: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Created ingredient {} ({})", row.name, row.id);

    Ok(row)
}

pub async fn get_or_create_ingredient(
    pool: &Pool<Postgres>,
    name: &str,
    measurement_unit: &str,
) -> Result<bool, Error> {
    let result = sqlx::query(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(name)
    .bind(measurement_unit)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
