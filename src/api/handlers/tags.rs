use std::sync::Arc;

use warp::{reply::Response, Rejection};

use crate::{
    actions::{create_tag, find_taken_tag_fields, get_tag, list_tags},
    api::{reply, state::AppState},
    error::{HtmlError, ValidationErrors},
    form::{Form, FormData},
    jwt::SessionData,
    permissions::ActionType,
    schema::Uuid,
    validation,
};

pub async fn list(state: Arc<AppState>) -> Result<Response, Rejection> {
    let tags = list_tags(&state.pool, &state.cache).await?;

    Ok(reply::ok(&tags))
}

pub async fn retrieve(id: Uuid, state: Arc<AppState>) -> Result<Response, Rejection> {
    let tag = get_tag(&state.pool, &state.cache, id)
        .await?
        .ok_or_else(|| Rejection::from(HtmlError::NotFound.default()))?;

    Ok(reply::ok(&tag))
}

pub async fn create(
    data: FormData,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;
    let form = Form::from_data(data);

    let mut errors = ValidationErrors::new();
    let tag = validation::tag(&form, &mut errors);
    if let Some(tag) = &tag {
        for field in find_taken_tag_fields(&state.pool, tag).await? {
            errors.add(field, &format!("Tag with this {field} already exists."));
        }
    }
    errors.into_result()?;
    let tag = tag.ok_or_else(|| Rejection::from(HtmlError::InvalidRequest.default()))?;

    let tag = create_tag(&state.pool, &state.cache, &tag).await?;

    Ok(reply::created(&tag))
}
