use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::error::{Error, HtmlError};
use crate::schema::UserRole;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, username: String, role: UserRole, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            role,
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
    pub jti: String,
    pub exp: i64,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(HtmlError::Forbidden.default());
        }
        Ok(())
    }

    /// Authors may always touch their own content, `all` extends that to other authors
    pub fn authenticate_owner(
        &self,
        owner_id: i32,
        own: ActionType,
        all: ActionType,
    ) -> Result<(), Error> {
        if all.authenticate(self) {
            return Ok(());
        }
        self.authenticate(own)?;

        if owner_id != self.user_id {
            return Err(HtmlError::Forbidden.default());
        }
        Ok(())
    }
}

impl SessionData {
    /// Session of verified `claims`, acting with the role currently stored for the user.
    /// The role claim only reflects the role at login.
    pub fn new(claims: JwtSessionData, role: UserRole) -> Self {
        SessionData {
            username: claims.username,
            user_id: claims.user_id,
            is_admin: role == UserRole::Admin,
            role,
            jti: claims.jti,
            exp: claims.exp,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|e| {
        log::error!("Invalid signing key: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn generate_jwt_session(
    user: &User,
    secret: &str,
    lifetime: Duration,
) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned(), lifetime);

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.default())?;

    let now = Utc::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Token expired."));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 3,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Cook"),
            last_name: String::from("Book"),
            password: String::new(),
            role,
        }
    }

    fn session(id: i32, claimed: UserRole, stored: UserRole) -> SessionData {
        let claims = JwtSessionData::new(id, String::from("cook"), claimed, Duration::hours(1));
        SessionData::new(claims, stored)
    }

    #[test]
    fn session_roundtrip() {
        let token = generate_jwt_session(&user(UserRole::Admin), "secret", Duration::hours(1)).unwrap();
        let claims = verify_jwt_session(&token, "secret").unwrap();
        assert_eq!(claims.role, UserRole::Admin);

        let session = SessionData::new(claims, UserRole::Admin);
        assert_eq!(session.user_id, 3);
        assert_eq!(session.username, "cook");
        assert!(session.is_admin);
        assert!(!session.jti.is_empty());
    }

    #[test]
    fn tokens_get_unique_ids() {
        let a = generate_jwt_session(&user(UserRole::User), "secret", Duration::hours(1)).unwrap();
        let b = generate_jwt_session(&user(UserRole::User), "secret", Duration::hours(1)).unwrap();

        let a = verify_jwt_session(&a, "secret").unwrap();
        let b = verify_jwt_session(&b, "secret").unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_session(&user(UserRole::User), "secret", Duration::hours(1)).unwrap();
        let err = verify_jwt_session(&token, "other").unwrap_err();

        assert_eq!(err.code, 401);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token =
            generate_jwt_session(&user(UserRole::User), "secret", Duration::hours(-1)).unwrap();
        let err = verify_jwt_session(&token, "secret").unwrap_err();

        assert_eq!(err.code, 401);
        assert_eq!(err.info.as_deref(), Some("Token expired."));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_jwt_session("not.a.token", "secret").is_err());
    }

    #[test]
    fn owners_and_admins_may_manage() {
        let author = session(3, UserRole::User, UserRole::User);
        let admin = session(9, UserRole::Admin, UserRole::Admin);

        let own = ActionType::ManageOwnRecipes;
        let all = ActionType::ManageAllRecipes;

        assert!(author.authenticate_owner(3, own, all).is_ok());
        assert_eq!(author.authenticate_owner(4, own, all).unwrap_err().code, 403);
        assert!(admin.authenticate_owner(4, own, all).is_ok());
    }

    #[test]
    fn stored_role_overrides_claim() {
        let demoted = session(9, UserRole::Admin, UserRole::User);
        assert!(!demoted.is_admin);
        assert_eq!(demoted.authenticate(ActionType::ManageTags).unwrap_err().code, 403);
        assert_eq!(
            demoted
                .authenticate_owner(4, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes)
                .unwrap_err()
                .code,
            403
        );

        let promoted = session(3, UserRole::User, UserRole::Admin);
        assert!(promoted.authenticate(ActionType::ManageForbiddenWords).is_ok());
    }
}
