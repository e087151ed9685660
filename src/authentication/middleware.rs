use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use crate::{
    constants::SESSION_COOKIE,
    database::actions::sessions::is_session_revoked,
    error::{Error, HtmlError},
    state::SharedState,
};

use super::jwt::{verify_jwt_session, SessionData};

pub fn with_state(
    state: SharedState,
) -> impl Filter<Extract = (SharedState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Token from `Authorization: Token <jwt>` or `Bearer <jwt>`, falling back to the session cookie.
pub fn extract_token(header: Option<&str>, cookie: Option<&str>) -> Option<String> {
    if let Some(header) = header {
        let (scheme, token) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        return (!token.is_empty()).then(|| token.to_string());
    }

    cookie
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

async fn authenticate_token(state: &SharedState, token: &str) -> Result<SessionData, Error> {
    let session = verify_jwt_session(&state.keys, token)?;
    if is_session_revoked(&state.pool, &session.sid).await? {
        return Err(HtmlError::InvalidSession.new("Invalid token."));
    }
    Ok(session.into())
}

fn credentials() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .map(|header: Option<String>, cookie: Option<String>| {
            extract_token(header.as_deref(), cookie.as_deref())
        })
}

/// Requires a valid, unrevoked session.
pub fn with_session(
    state: SharedState,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    credentials()
        .and(with_state(state))
        .and_then(|token: Option<String>, state: SharedState| async move {
            let Some(token) = token else {
                return Err(Rejection::from(HtmlError::Unauthorized.default()));
            };
            authenticate_token(&state, &token)
                .await
                .map_err(Rejection::from)
        })
}

/// Anonymous requests pass as `None`; a presented but invalid token is still rejected.
pub fn with_possible_session(
    state: SharedState,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    credentials()
        .and(with_state(state))
        .and_then(|token: Option<String>, state: SharedState| async move {
            match token {
                Some(token) => authenticate_token(&state, &token)
                    .await
                    .map(Some)
                    .map_err(Rejection::from),
                None => Ok(None),
            }
        })
}
