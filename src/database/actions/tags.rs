use sqlx::{Pool, Postgres};

use crate::{
    cache::cache::{Cache, CacheKeyType, CacheLifetime},
    error::{Error, QueryError},
    schema::{NewTag, Tag, Uuid},
};

pub async fn list_tags(pool: &Pool<Postgres>, cache: &Cache) -> Result<Vec<Tag>, Error> {
    cache
        .get_or(CacheKeyType::TagList.new("all"), move || async move {
            let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
                .fetch_all(pool)
                .await
                .map_err(QueryError::from)?;

            Ok::<_, Error>(list)
        })
        .await
}

pub async fn get_tag(pool: &Pool<Postgres>, cache: &Cache, id: Uuid) -> Result<Option<Tag>, Error> {
    cache
        .get_or_optional(CacheKeyType::Tag.new(id), move || async move {
            let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(QueryError::from)?;

            Ok::<_, Error>(tag)
        })
        .await
}

/// Tag ids from `ids` that have no row
pub async fn find_missing_tags(pool: &Pool<Postgres>, ids: &[Uuid]) -> Result<Vec<Uuid>, Error> {
    let existing: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
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

/// Returns the fields of `tag` that collide with an existing tag
pub async fn find_taken_tag_fields(
    pool: &Pool<Postgres>,
    tag: &NewTag,
) -> Result<Vec<&'static str>, Error> {
    let row: (bool, bool, bool) = sqlx::query_as(
        "
        SELECT
            EXISTS(SELECT 1 FROM tags WHERE name = $1),
            EXISTS(SELECT 1 FROM tags WHERE UPPER(color) = UPPER($2)),
            EXISTS(SELECT 1 FROM tags WHERE slug = $3)
    ",
    )
    .bind(&tag.name)
    .bind(&tag.color)
    .bind(&tag.slug)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok([("name", row.0), ("color", row.1), ("slug", row.2)]
        .into_iter()
        .filter(|(_, taken)| *taken)
        .map(|(field, _)| field)
        .collect())
}

pub async fn create_tag(pool: &Pool<Postgres>, cache: &Cache, tag: &NewTag) -> Result<Tag, Error> {
    let row: Tag =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
            .bind(&tag.name)
            .bind(&tag.color)
            .bind(&tag.slug)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    cache.invalidate(CacheLifetime::BindTagCache).await;
    log::info!("Created tag {} ({})", row.slug, row.id);

    Ok(row)
}

/// Inserts the tag unless one with the same slug exists, returns whether a row was added
pub async fn get_or_create_tag(pool: &Pool<Postgres>, tag: &NewTag) -> Result<bool, Error> {
    let result = sqlx::query(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(&tag.name)
    .bind(&tag.color)
    .bind(&tag.slug)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}
