use warp::{reject::Rejection, reply::Response, Filter};

use crate::{
    constants::SHOPPING_LIST_FILENAME,
    database::{
        actions::{
            favorites,
            recipes::{self, RecipeFilter},
            shopping_cart,
        },
        form::{Form, QueryPairs},
        pagination::PageRequest,
        payload::RecipeForm,
    },
    error::{Error, HtmlError},
    jwt::SessionData,
    middleware::{with_possible_session, with_session, with_state},
    schema::{Id, Recipe},
    state::{AppState, SharedState},
};

use super::reply::{attachment, created, json, no_content, MAX_BODY_BYTES};

const RECIPES_PATH: &str = "/api/recipes/";

pub fn routes(state: SharedState) -> warp::filters::BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(warp::query::<QueryPairs>())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let retrieve = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_recipe);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(update_recipe);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_recipe);

    let favorite = warp::path!("api" / "recipes" / Id / "favorite")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(add_favorite);

    let unfavorite = warp::path!("api" / "recipes" / Id / "favorite")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(remove_favorite);

    let cart_add = warp::path!("api" / "recipes" / Id / "shopping_cart")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(add_to_cart);

    let cart_remove = warp::path!("api" / "recipes" / Id / "shopping_cart")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(remove_from_cart);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(favorite)
        .unify()
        .or(unfavorite)
        .unify()
        .or(cart_add)
        .unify()
        .or(cart_remove)
        .unify()
        .boxed()
}

/// Reads a recipe back in the viewer's perspective after a write.
async fn read_back(state: &AppState, id: Id, viewer: Id) -> Result<Recipe, Error> {
    recipes::get_recipe(&state.pool, &state.cache, id, Some(viewer))
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())
}

async fn list_recipes(
    query: QueryPairs,
    session: Option<SessionData>,
    state: SharedState,
) -> Result<Response, Rejection> {
    let form = Form::from_data(query);
    let page = PageRequest::from_form(RECIPES_PATH, &form)?;
    let filter = RecipeFilter::from_form(&form)?;
    let viewer = session.map(|s| s.user_id);

    let list = recipes::fetch_recipes(&state.pool, &state.cache, &filter, viewer, &page).await?;
    Ok(json(&list))
}

async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    state: SharedState,
) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let Some(recipe) = recipes::get_recipe(&state.pool, &state.cache, id, viewer).await? else {
        return Err(HtmlError::NotFound.default().into());
    };

    Ok(json(&recipe))
}

async fn create_recipe(
    session: SessionData,
    form: RecipeForm,
    state: SharedState,
) -> Result<Response, Rejection> {
    let draft = form.validate(true)?;
    let id = recipes::create_recipe(&state.pool, &state.media, &session, draft).await?;

    Ok(created(&read_back(&state, id, session.user_id).await?))
}

async fn update_recipe(
    id: Id,
    session: SessionData,
    form: RecipeForm,
    state: SharedState,
) -> Result<Response, Rejection> {
    let draft = form.validate(false)?;
    recipes::update_recipe(&state.pool, &state.cache, &state.media, &session, id, draft).await?;

    Ok(json(&read_back(&state, id, session.user_id).await?))
}

async fn delete_recipe(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    recipes::delete_recipe(&state.pool, &state.cache, &state.media, &session, id).await?;
    Ok(no_content())
}

async fn add_favorite(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    let recipe = favorites::add_favorite(&state.pool, &session, id).await?;
    Ok(created(&recipe))
}

async fn remove_favorite(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    favorites::remove_favorite(&state.pool, &session, id).await?;
    Ok(no_content())
}

async fn add_to_cart(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    let recipe = shopping_cart::add_to_cart(&state.pool, &session, id).await?;
    Ok(created(&recipe))
}

async fn remove_from_cart(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    shopping_cart::remove_from_cart(&state.pool, &session, id).await?;
    Ok(no_content())
}

async fn download_shopping_cart(
    session: SessionData,
    state: SharedState,
) -> Result<Response, Rejection> {
    let items = shopping_cart::shopping_list(&state.pool, session.user_id).await?;
    let body = shopping_cart::render_shopping_list(&session.username, &items);

    Ok(attachment(body, SHOPPING_LIST_FILENAME))
}
