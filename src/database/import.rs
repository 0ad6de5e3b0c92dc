use std::path::Path;

use sqlx::{Pool, Postgres};

use super::{
    actions::{get_or_create_ingredient, get_or_create_tag},
    error::{Error, HtmlError},
    schema::NewTag,
};

pub const INGREDIENTS_FILE: &str = "ingredients.csv";
pub const TAGS_FILE: &str = "tags.csv";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub read: usize,
    pub created: usize,
}

/// Splits one CSV record into fields. Quoted fields may contain commas and `""` escapes.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => quoted = false,
            ('"', false) if field.is_empty() => quoted = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }
    fields.push(field);

    fields
}

/// Non-empty records of `path` with exactly `columns` fields
async fn read_records(path: &Path, columns: usize) -> Result<Vec<Vec<String>>, Error> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        log::error!("Failed to read {}: {e}", path.display());
        HtmlError::InternalServerError.new(&format!("Failed to read {}", path.display()))
    })?;

    let mut records = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record = parse_csv_line(line);
        if record.len() != columns {
            return Err(HtmlError::InvalidRequest.new(&format!(
                "{}:{}: expected {columns} columns, found {}",
                path.display(),
                number + 1,
                record.len()
            )));
        }
        records.push(record);
    }

    Ok(records)
}

pub async fn import_ingredients(pool: &Pool<Postgres>, path: &Path) -> Result<ImportSummary, Error> {
    let mut summary = ImportSummary::default();

    for record in read_records(path, 2).await? {
        let (name, unit) = (record[0].trim(), record[1].trim());
        if get_or_create_ingredient(pool, name, unit).await? {
            summary.created += 1;
        }
        summary.read += 1;
        log::info!("Imported Ingredient: {name}");
    }

    Ok(summary)
}

pub async fn import_tags(pool: &Pool<Postgres>, path: &Path) -> Result<ImportSummary, Error> {
    let mut summary = ImportSummary::default();

    for record in read_records(path, 3).await? {
        let tag = NewTag {
            name: record[0].trim().to_string(),
            color: record[1].trim().to_uppercase(),
            slug: record[2].trim().to_string(),
        };
        if get_or_create_tag(pool, &tag).await? {
            summary.created += 1;
        }
        summary.read += 1;
        log::info!("Imported Tag: {}", tag.name);
    }

    Ok(summary)
}

/// Imports `ingredients.csv` and `tags.csv` from `folder`
pub async fn import_folder(
    pool: &Pool<Postgres>,
    folder: &Path,
) -> Result<(ImportSummary, ImportSummary), Error> {
    let ingredients = import_ingredients(pool, &folder.join(INGREDIENTS_FILE)).await?;
    let tags = import_tags(pool, &folder.join(TAGS_FILE)).await?;

    Ok((ingredients, tags))
}
