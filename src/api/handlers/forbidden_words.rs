use std::sync::Arc;

use warp::{reply::Response, Rejection};

use crate::{
    actions::{
        create_forbidden_word, delete_forbidden_word, forbidden_word_exists, list_forbidden_words,
    },
    api::{reply, state::AppState},
    error::{HtmlError, ValidationErrors},
    form::{Form, FormData},
    jwt::SessionData,
    permissions::ActionType,
    schema::Uuid,
    validation,
};

pub async fn list(session: SessionData, state: Arc<AppState>) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageForbiddenWords)?;

    let words = list_forbidden_words(&state.pool).await?;

    Ok(reply::ok(&words))
}

pub async fn create(
    data: FormData,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageForbiddenWords)?;
    let form = Form::from_data(data);

    let mut errors = ValidationErrors::new();
    let word = validation::forbidden_word(&form, &mut errors);
    if let Some(word) = &word {
        if forbidden_word_exists(&state.pool, word).await? {
            errors.add("word", "Forbidden word with this word already exists.");
        }
    }
    errors.into_result()?;
    let word = word.ok_or_else(|| Rejection::from(HtmlError::InvalidRequest.default()))?;

    let word = create_forbidden_word(&state.pool, &state.cache, &word).await?;

    Ok(reply::created(&word))
}

pub async fn delete(
    id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageForbiddenWords)?;

    delete_forbidden_word(&state.pool, &state.cache, id).await?;

    Ok(reply::no_content())
}
