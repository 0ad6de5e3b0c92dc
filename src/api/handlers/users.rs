use std::sync::Arc;

use warp::{reply::Response, Rejection};

use crate::{
    actions::{
        find_taken_credentials, get_subscription_profile, get_user_by_id, get_user_profile,
        list_subscriptions, list_users, register_user, set_password, subscribe, unsubscribe,
    },
    api::{reply, state::AppState},
    cryptography::{hash_password, verify_password},
    error::{HtmlError, ValidationErrors},
    form::{Form, FormData},
    jwt::SessionData,
    pagination::{PageRequest, Query},
    permissions::ActionType,
    schema::{CreatedUser, ResolveMedia, UserRole, Uuid},
    validation::{self, EMAIL_TAKEN, USERNAME_TAKEN, WRONG_PASSWORD},
};

fn hashing_failed(e: argon2::password_hash::Error) -> Rejection {
    log::error!("Failed to hash password: {e}");
    HtmlError::InternalServerError.default().into()
}

pub async fn list(
    query: Query,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let request =
        PageRequest::from_query(&query, state.config.page_size, state.public_url("/api/users/"))?;
    let viewer = session.map(|s| s.user_id);

    let page = list_users(&state.pool, viewer, &request).await?;

    Ok(reply::ok(&page))
}

pub async fn register(data: FormData, state: Arc<AppState>) -> Result<Response, Rejection> {
    let form = Form::from_data(data);
    let words = state.forbidden_words().await?;

    let mut errors = ValidationErrors::new();
    let user = validation::registration(&form, &words, &mut errors);

    let email = form.get_str("email").unwrap_or_default();
    let username = form.get_str("username").unwrap_or_default();
    let (email_taken, username_taken) =
        find_taken_credentials(&state.pool, email.trim(), &username).await?;
    if email_taken && !errors.contains("email") {
        errors.add("email", EMAIL_TAKEN);
    }
    if username_taken && !errors.contains("username") {
        errors.add("username", USERNAME_TAKEN);
    }
    errors.into_result()?;

    let mut user = user.ok_or_else(|| Rejection::from(HtmlError::InvalidRequest.default()))?;
    user.password = hash_password(&user.password).map_err(hashing_failed)?;

    let user = register_user(&state.pool, &user, UserRole::User).await?;

    Ok(reply::created(&CreatedUser::from(user)))
}

pub async fn retrieve(
    id: Uuid,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let profile = get_user_profile(&state.pool, id, viewer)
        .await?
        .ok_or_else(|| Rejection::from(HtmlError::NotFound.default()))?;

    Ok(reply::ok(&profile))
}

pub async fn me(session: SessionData, state: Arc<AppState>) -> Result<Response, Rejection> {
    let profile = get_user_profile(&state.pool, session.user_id, Some(session.user_id))
        .await?
        .ok_or_else(|| Rejection::from(HtmlError::NotFound.default()))?;

    Ok(reply::ok(&profile))
}

pub async fn change_password(
    data: FormData,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let form = Form::from_data(data);

    let mut errors = ValidationErrors::new();
    let passwords = validation::password_change(&form, &mut errors);
    errors.into_result()?;
    let (current, new) =
        passwords.ok_or_else(|| Rejection::from(HtmlError::InvalidRequest.default()))?;

    let user = get_user_by_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| Rejection::from(HtmlError::InvalidSession.default()))?;

    let matches = verify_password(&current, &user.password).map_err(hashing_failed)?;
    if !matches {
        let mut errors = ValidationErrors::new();
        errors.add("current_password", WRONG_PASSWORD);
        errors.into_result()?;
    }

    let hash = hash_password(&new).map_err(hashing_failed)?;
    set_password(&state.pool, user.id, &hash).await?;
    log::info!("User {} changed their password", user.id);

    Ok(reply::no_content())
}

pub async fn subscriptions(
    query: Query,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let request = PageRequest::from_query(
        &query,
        state.config.page_size,
        state.public_url("/api/users/subscriptions/"),
    )?;
    let recipes_limit = query.get_limit("recipes_limit");

    let page = list_subscriptions(&state.pool, session.user_id, recipes_limit, &request).await?;

    Ok(reply::ok(&page.map(|profile| profile.resolve_media(&state.media))))
}

pub async fn add_subscription(
    author_id: Uuid,
    query: Query,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    subscribe(&state.pool, session.user_id, author_id).await?;

    let profile = get_subscription_profile(
        &state.pool,
        session.user_id,
        author_id,
        query.get_limit("recipes_limit"),
    )
    .await?;

    Ok(reply::created(&profile.resolve_media(&state.media)))
}

pub async fn remove_subscription(
    author_id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    unsubscribe(&state.pool, session.user_id, author_id).await?;

    Ok(reply::no_content())
}
