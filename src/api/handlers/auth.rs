use std::sync::Arc;

use serde_json::json;
use warp::{reply::Response, Rejection};

use crate::{
    actions::{login_user, revoke_token},
    api::{reply, state::AppState},
    error::{HtmlError, ValidationErrors},
    form::{Form, FormData},
    jwt::SessionData,
};

pub async fn login(data: FormData, state: Arc<AppState>) -> Result<Response, Rejection> {
    let form = Form::from_data(data);

    let mut errors = ValidationErrors::new();
    let email = errors.check("email", form.get_str("email"));
    let password = errors.check("password", form.get_str("password"));
    errors.into_result()?;

    let (Some(email), Some(password)) = (email, password) else {
        return Err(HtmlError::InvalidRequest.default().into());
    };

    let token = login_user(
        &state.pool,
        &email,
        &password,
        &state.config.secret_key,
        chrono::Duration::hours(state.config.token_lifetime_hours),
    )
    .await?;

    Ok(reply::ok(&json!({ "auth_token": token })))
}

pub async fn logout(session: SessionData, state: Arc<AppState>) -> Result<Response, Rejection> {
    revoke_token(&state.pool, &session.jti, session.exp).await?;
    log::debug!("User {} logged out", session.user_id);

    Ok(reply::no_content())
}
