use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::{
    actions::session_status,
    api::state::{with_state, AppState},
    error::{Error, HtmlError},
};

use super::jwt::{verify_jwt_session, SessionData};

/// Extracts the token from `Authorization: Token <token>` (or `Bearer <token>`)
pub fn parse_authorization(header: &str) -> Result<&str, Error> {
    let mut parts = header.split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") =>
        {
            Ok(token)
        }
        _ => Err(HtmlError::InvalidSession.default()),
    }
}

pub async fn authenticate(header: &str, state: &AppState) -> Result<SessionData, Error> {
    let token = parse_authorization(header)?;
    let session = verify_jwt_session(token, &state.config.secret_key)?;

    let (revoked, role) = session_status(&state.pool, &session.jti, session.user_id).await?;
    let role = match role {
        Some(role) if !revoked => role,
        _ => {
            log::debug!("Rejected session {} of user {}", session.jti, session.user_id);
            return Err(HtmlError::InvalidSession.default());
        }
    };
    if role != session.role {
        log::debug!("User {} acts as {role:?} since login", session.user_id);
    }

    Ok(SessionData::new(session, role))
}

pub fn with_session(
    state: Arc<AppState>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: Arc<AppState>| async move {
            match header {
                Some(header) => authenticate(&header, &state)
                    .await
                    .map_err(Rejection::from),
                None => Err(Rejection::from(HtmlError::Unauthorized.default())),
            }
        })
}

/// Anonymous requests pass as `None`, a present but invalid token is still rejected
pub fn with_possible_session(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: Arc<AppState>| async move {
            match header {
                Some(header) => authenticate(&header, &state)
                    .await
                    .map(Some)
                    .map_err(Rejection::from),
                None => Ok(None),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_and_bearer_schemes_are_accepted() {
        assert_eq!(parse_authorization("Token abc.def.ghi").unwrap(), "abc.def.ghi");
        assert_eq!(parse_authorization("Bearer abc").unwrap(), "abc");
        assert_eq!(parse_authorization("token  abc").unwrap(), "abc");
    }

    #[test]
    fn malformed_headers_are_rejected() {
        for header in ["", "Token", "Basic abc", "Token a b"] {
            assert_eq!(parse_authorization(header).unwrap_err().code, 401);
        }
    }
}
