use std::sync::Arc;

use warp::{reply::Response, Rejection};

use crate::{
    actions::{
        add_to_list, create_recipe, delete_recipe, fetch_recipes, find_missing_ingredients,
        find_missing_tags, get_recipe, get_recipe_detail, list_shopping_list, remove_from_list,
        update_recipe, user_exists,
    },
    api::{reply, state::AppState},
    error::{Error, HtmlError, TypeError, ValidationErrors},
    form::{Form, FormData},
    jwt::SessionData,
    pagination::{PageRequest, Query},
    permissions::ActionType,
    schema::{BookmarkList, RecipeData, RecipeDetail, RecipeFilter, ResolveMedia, Uuid},
    validation::{self, RecipeInput, MISSING_INGREDIENT, MISSING_TAG},
};

pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

fn parse_flag(value: Option<&str>) -> Result<bool, TypeError> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(_) => Err(TypeError::new("Enter a valid boolean.")),
    }
}

/// Query string filters of the recipe list. Unknown authors are rejected here.
async fn parse_filter(query: &Query, state: &AppState) -> Result<RecipeFilter, Error> {
    let mut errors = ValidationErrors::new();

    let author = match query.get("author").filter(|v| !v.trim().is_empty()) {
        Some(author) => match author.trim().parse::<Uuid>() {
            Ok(id) if user_exists(&state.pool, id).await? => Some(id),
            _ => {
                errors.add("author", INVALID_CHOICE);
                None
            }
        },
        None => None,
    };
    let is_favorited = errors.check("is_favorited", parse_flag(query.get("is_favorited")));
    let is_in_shopping_cart = errors.check(
        "is_in_shopping_cart",
        parse_flag(query.get("is_in_shopping_cart")),
    );
    errors.into_result()?;

    Ok(RecipeFilter {
        tags: query
            .get_all("tags")
            .into_iter()
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect(),
        author,
        is_favorited: is_favorited.unwrap_or_default(),
        is_in_shopping_cart: is_in_shopping_cart.unwrap_or_default(),
    })
}

/// Validates the body and the tags and ingredients it references
async fn parse_recipe(
    data: FormData,
    partial: bool,
    state: &AppState,
) -> Result<RecipeInput, Error> {
    let form = Form::from_data(data);
    let words = state.forbidden_words().await?;

    let mut errors = ValidationErrors::new();
    let input = validation::recipe(&form, &words, partial, &mut errors);

    if let Some(input) = &input {
        if !find_missing_tags(&state.pool, &input.data.tags).await?.is_empty() {
            errors.add("tags", MISSING_TAG);
        }

        let ids: Vec<Uuid> = input.data.ingredients.iter().map(|part| part.id).collect();
        if !find_missing_ingredients(&state.pool, &ids).await?.is_empty() {
            errors.add("ingredients", MISSING_INGREDIENT);
        }
    }
    errors.into_result()?;

    input.ok_or_else(|| HtmlError::InvalidRequest.default())
}

/// Stores the decoded image, if any, and returns the data pointing at it
async fn store_image(input: RecipeInput, state: &AppState) -> Result<RecipeData, Error> {
    let mut data = input.data;
    if let Some(image) = &input.image {
        data.image = Some(state.media.save(image).await?);
    }
    Ok(data)
}

async fn detail_reply(
    id: Uuid,
    viewer: Uuid,
    state: &AppState,
) -> Result<RecipeDetail, Error> {
    let recipe = get_recipe_detail(&state.pool, Some(viewer), id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(recipe.resolve_media(&state.media))
}

pub async fn list(
    query: Query,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let filter = parse_filter(&query, &state).await?;
    let request = PageRequest::from_query(
        &query,
        state.config.page_size,
        state.public_url("/api/recipes/"),
    )?;
    let viewer = session.map(|s| s.user_id);

    let page = fetch_recipes(&state.pool, viewer, &filter, &request).await?;

    Ok(reply::ok(&page.map(|recipe| recipe.resolve_media(&state.media))))
}

pub async fn retrieve(
    id: Uuid,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let recipe = get_recipe_detail(&state.pool, viewer, id)
        .await?
        .ok_or_else(|| Rejection::from(HtmlError::NotFound.default()))?;

    Ok(reply::ok(&recipe.resolve_media(&state.media)))
}

pub async fn create(
    data: FormData,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;

    let input = parse_recipe(data, false, &state).await?;
    let data = store_image(input, &state).await?;

    let id = match create_recipe(&state.pool, session.user_id, &data).await {
        Ok(id) => id,
        Err(e) => {
            if let Some(image) = &data.image {
                state.media.remove(image).await;
            }
            return Err(e.into());
        }
    };

    let recipe = detail_reply(id, session.user_id, &state).await?;
    Ok(reply::created(&recipe))
}

pub async fn update(
    id: Uuid,
    data: FormData,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let recipe = get_recipe(&state.pool, id)
        .await?
        .ok_or_else(|| Rejection::from(HtmlError::NotFound.default()))?;
    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    let input = parse_recipe(data, true, &state).await?;
    let data = store_image(input, &state).await?;

    if let Err(e) = update_recipe(&state.pool, id, &data).await {
        if let Some(image) = &data.image {
            state.media.remove(image).await;
        }
        return Err(e.into());
    }
    if data.image.is_some() {
        state.media.remove(&recipe.image).await;
    }

    let recipe = detail_reply(id, session.user_id, &state).await?;
    Ok(reply::ok(&recipe))
}

pub async fn delete(
    id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let recipe = get_recipe(&state.pool, id)
        .await?
        .ok_or_else(|| Rejection::from(HtmlError::NotFound.default()))?;
    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    delete_recipe(&state.pool, id).await?;
    state.media.remove(&recipe.image).await;

    Ok(reply::no_content())
}

pub async fn add_bookmark(
    list: BookmarkList,
    id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;

    let recipe = add_to_list(&state.pool, list, session.user_id, id).await?;

    Ok(reply::created(&recipe.resolve_media(&state.media)))
}

pub async fn remove_bookmark(
    list: BookmarkList,
    id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;

    remove_from_list(&state.pool, list, session.user_id, id).await?;

    Ok(reply::no_content())
}

pub async fn download_shopping_cart(
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;

    let entries = list_shopping_list(&state.pool, session.user_id).await?;
    log::debug!(
        "User {} downloaded a shopping list of {} items",
        session.user_id,
        entries.len()
    );

    Ok(reply::shopping_list(&entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        assert!(!parse_flag(None).unwrap());
        assert!(!parse_flag(Some("0")).unwrap());
        assert!(!parse_flag(Some("False")).unwrap());
        assert!(parse_flag(Some("1")).unwrap());
        assert!(parse_flag(Some("true")).unwrap());
        assert!(parse_flag(Some("yes please")).is_err());
    }
}
