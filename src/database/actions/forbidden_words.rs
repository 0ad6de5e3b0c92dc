use sqlx::{Pool, Postgres};

use crate::{
    cache::cache::{Cache, CacheKeyType, CacheLifetime},
    error::{Error, HtmlError, QueryError},
    moderation::obscenity::ForbiddenWords,
    schema::{ForbiddenWord, Uuid},
};

pub async fn list_forbidden_words(pool: &Pool<Postgres>) -> Result<Vec<ForbiddenWord>, Error> {
    let rows: Vec<ForbiddenWord> = sqlx::query_as("SELECT * FROM forbidden_words ORDER BY word")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

/// The filter free text is validated against, read through the cache
pub async fn load_forbidden_words(
    pool: &Pool<Postgres>,
    cache: &Cache,
    threshold: usize,
) -> Result<ForbiddenWords, Error> {
    let words: Vec<String> = cache
        .get_or(CacheKeyType::ForbiddenWords.new("all"), move || async move {
            let rows: Vec<(String,)> = sqlx::query_as("SELECT word FROM forbidden_words")
                .fetch_all(pool)
                .await
                .map_err(QueryError::from)?;

            Ok::<_, Error>(rows.into_iter().map(|row| row.0).collect())
        })
        .await?;

    Ok(ForbiddenWords::new(words, threshold))
}

pub async fn forbidden_word_exists(pool: &Pool<Postgres>, word: &str) -> Result<bool, Error> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM forbidden_words WHERE LOWER(word) = LOWER($1))")
            .bind(word)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.0)
}

pub async fn create_forbidden_word(
    pool: &Pool<Postgres>,
    cache: &Cache,
    word: &str,
) -> Result<ForbiddenWord, Error> {
    let row: ForbiddenWord =
        sqlx::query_as("INSERT INTO forbidden_words (word) VALUES ($1) RETURNING *")
            .bind(word)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    cache.invalidate(CacheLifetime::BindForbiddenWordCache).await;
    log::info!("Added forbidden word {}", row.id);

    Ok(row)
}

pub async fn delete_forbidden_word(
    pool: &Pool<Postgres>,
    cache: &Cache,
    id: Uuid,
) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM forbidden_words WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }

    cache.invalidate(CacheLifetime::BindForbiddenWordCache).await;
    log::info!("Removed forbidden word {id}");

    Ok(())
}
