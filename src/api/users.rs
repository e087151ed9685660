use warp::{
    http::header,
    reject::Rejection,
    reply::{self, Reply, Response},
    Filter,
};

use crate::{
    constants::SESSION_COOKIE,
    database::{
        actions::{sessions, subscriptions, users},
        form::{Form, QueryPairs},
        pagination::PageRequest,
        payload::{LoginForm, RegisterForm, SetPasswordForm},
    },
    error::{Error, HtmlError},
    jwt::SessionData,
    middleware::{with_possible_session, with_session, with_state},
    schema::{AuthToken, CreatedUser, Id},
    state::SharedState,
};

use super::reply::{created, json, no_content, MAX_BODY_BYTES};

const USERS_PATH: &str = "/api/users/";
const SUBSCRIPTIONS_PATH: &str = "/api/users/subscriptions/";

pub fn routes(state: SharedState) -> warp::filters::BoxedFilter<(Response,)> {
    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(register);

    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(warp::query::<QueryPairs>())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_users);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(me);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(set_password);

    let subscription_list = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<QueryPairs>())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let retrieve = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(retrieve);

    let subscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(warp::query::<QueryPairs>())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(unsubscribe);

    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(login);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(logout);

    register
        .or(list)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(subscription_list)
        .unify()
        .or(retrieve)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .or(login)
        .unify()
        .or(logout)
        .unify()
        .boxed()
}

async fn register(form: RegisterForm, state: SharedState) -> Result<Response, Rejection> {
    let user = form.validate()?;
    let user = users::register_user(&state.pool, user).await?;

    Ok(created(&CreatedUser::from(user)))
}

async fn list_users(
    query: QueryPairs,
    session: Option<SessionData>,
    state: SharedState,
) -> Result<Response, Rejection> {
    let form = Form::from_data(query);
    let page = PageRequest::from_form(USERS_PATH, &form)?;
    let viewer = session.map(|s| s.user_id);

    let users = users::fetch_users(&state.pool, viewer, &page).await?;
    Ok(json(&users))
}

async fn me(session: SessionData, state: SharedState) -> Result<Response, Rejection> {
    let profile = users::get_profile(&state.pool, session.user_id, Some(session.user_id))
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json(&profile))
}

async fn retrieve(
    id: Id,
    session: Option<SessionData>,
    state: SharedState,
) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let Some(profile) = users::get_profile(&state.pool, id, viewer).await? else {
        return Err(HtmlError::NotFound.default().into());
    };

    Ok(json(&profile))
}

async fn set_password(
    session: SessionData,
    form: SetPasswordForm,
    state: SharedState,
) -> Result<Response, Rejection> {
    let (current, new) = form.validate()?;
    users::set_password(&state.pool, session.user_id, &current, &new).await?;

    Ok(no_content())
}

async fn list_subscriptions(
    query: QueryPairs,
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    let form = Form::from_data(query);
    let page = PageRequest::from_form(SUBSCRIPTIONS_PATH, &form)?;
    let limit = subscriptions::recipes_limit(&form)?;

    let list = subscriptions::fetch_subscriptions(&state.pool, &session, &page, limit).await?;
    Ok(json(&list))
}

async fn subscribe(
    author_id: Id,
    query: QueryPairs,
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    let limit = subscriptions::recipes_limit(&Form::from_data(query))?;
    let subscription = subscriptions::subscribe(&state.pool, &session, author_id, limit).await?;

    Ok(created(&subscription))
}

async fn unsubscribe(
    author_id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    subscriptions::unsubscribe(&state.pool, &session, author_id).await?;
    Ok(no_content())
}

async fn login(form: LoginForm, state: SharedState) -> Result<Response, Rejection> {
    let email = form.email.unwrap_or_default();
    let password = form.password.unwrap_or_default();
    if email.trim().is_empty() {
        return Err(Error::field("email", "This field is required.").into());
    }
    if password.is_empty() {
        return Err(Error::field("password", "This field is required.").into());
    }

    let token = users::login_user(&state.pool, &state.keys, email.trim(), &password).await?;
    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        state.keys.lifetime_seconds()
    );

    Ok(reply::with_header(
        reply::json(&AuthToken { auth_token: token }),
        header::SET_COOKIE,
        cookie,
    )
    .into_response())
}

async fn logout(session: SessionData, state: SharedState) -> Result<Response, Rejection> {
    sessions::revoke_session(&state.pool, &session.session_id, session.expires_at).await?;
    log::debug!("User {} logged out", session.user_id);

    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    Ok(reply::with_header(no_content(), header::SET_COOKIE, cookie).into_response())
}
