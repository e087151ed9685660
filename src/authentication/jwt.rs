use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::{Error, HtmlError},
    schema::{Id, User, UserRole},
};

use super::permissions::ActionType;

/// Signing key and token lifetime.
#[derive(Clone, Debug)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, lifetime_hours: i64) -> Result<Self, Error> {
        if secret.is_empty() {
            log::warn!("Session secret is empty, tokens can be forged");
        }
        let lifetime = Duration::try_hours(lifetime_hours.max(1))
            .filter(|lifetime| Utc::now().checked_add_signed(*lifetime).is_some())
            .ok_or_else(|| {
                Error::field("session_lifetime_hours", "Session lifetime is too long.")
            })?;
        let key = Hmac::new_from_slice(secret.as_bytes()).map_err(|e| {
            log::error!("Invalid session secret: {e}");
            HtmlError::InternalServerError.default()
        })?;

        Ok(Self {
            key,
            lifetime,
        })
    }

    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime.num_seconds()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub sid: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user: &User, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: user.id,
            username: user.username.to_owned(),
            role: user.role.to_owned(),
            sid: uuid::Uuid::new_v4().to_string(),
            iat,
            exp,
        }
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub session_id: String,
    pub expires_at: i64,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(HtmlError::Forbidden.default());
        }
        Ok(())
    }

    /// Authors manage their own recipes, admins manage every recipe.
    pub fn authenticate_owner(&self, owner_id: Id) -> Result<(), Error> {
        self.authenticate(ActionType::ManageOwnRecipes)?;
        if owner_id == self.user_id {
            return Ok(());
        }
        self.authenticate(ActionType::ManageAllRecipes)
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            role: value.role,
            session_id: value.sid,
            expires_at: value.exp,
        }
    }
}

pub fn generate_jwt_session(keys: &SessionKeys, user: &User) -> Result<String, Error> {
    let claims = JwtSessionData::new(user, keys.lifetime);

    claims.sign_with_key(&keys.key).map_err(|e| {
        log::error!("Failed to sign session: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn verify_jwt_session(keys: &SessionKeys, token: &str) -> Result<JwtSessionData, Error> {
    let session: JwtSessionData = token
        .verify_with_key(&keys.key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid token."))?;

    let now = Utc::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Token expired."));
    }

    Ok(session)
}
