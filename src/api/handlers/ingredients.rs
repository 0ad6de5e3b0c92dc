use std::sync::Arc;

use warp::{reply::Response, Rejection};

use crate::{
    actions::{create_ingredient, get_ingredient, ingredient_exists, list_ingredients},
    api::{reply, state::AppState},
    error::{HtmlError, ValidationErrors, NON_FIELD_ERRORS},
    form::{Form, FormData},
    jwt::SessionData,
    pagination::Query,
    permissions::ActionType,
    schema::Uuid,
    validation,
};

pub const DUPLICATE_INGREDIENT: &str = "The fields name, measurement_unit must make a unique set.";

pub async fn list(query: Query, state: Arc<AppState>) -> Result<Response, Rejection> {
    let ingredients = list_ingredients(&state.pool, query.get("name")).await?;

    Ok(reply::ok(&ingredients))
}

pub async fn retrieve(id: Uuid, state: Arc<AppState>) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(&state.pool, id)
        .await?
        .ok_or_else(|| Rejection::from(HtmlError::NotFound.default()))?;

    Ok(reply::ok(&ingredient))
}

pub async fn create(
    data: FormData,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;
    let form = Form::from_data(data);

    let mut errors = ValidationErrors::new();
    let ingredient = validation::ingredient(&form, &mut errors);
    if let Some((name, unit)) = &ingredient {
        if ingredient_exists(&state.pool, name, unit).await? {
            errors.add(NON_FIELD_ERRORS, DUPLICATE_INGREDIENT);
        }
    }
    errors.into_result()?;
    let (name, unit) =
        ingredient.ok_or_else(|| Rejection::from(HtmlError::InvalidRequest.default()))?;

    let ingredient = create_ingredient(&state.pool, &name, &unit).await?;

    Ok(reply::created(&ingredient))
}
