use warp::{reject::Rejection, reply::Response, Filter};

use crate::{
    authentication::permissions::ActionType,
    database::{
        actions::{ingredients, tags},
        form::{Form, QueryPairs},
        payload::{IngredientForm, TagForm},
    },
    error::HtmlError,
    jwt::SessionData,
    middleware::{with_session, with_state},
    schema::Id,
    state::SharedState,
};

use super::reply::{created, json, MAX_BODY_BYTES};

/// Tags and ingredients.
pub fn routes(state: SharedState) -> warp::filters::BoxedFilter<(Response,)> {
    let tag_list = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_tags);

    let tag_create = warp::path!("api" / "tags")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_tag);

    let tag_detail = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_tag);

    let ingredient_list = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(warp::query::<QueryPairs>())
        .and(with_state(state.clone()))
        .and_then(list_ingredients);

    let ingredient_create = warp::path!("api" / "ingredients")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_ingredient);

    let ingredient_detail = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(with_state(state))
        .and_then(get_ingredient);

    tag_list
        .or(tag_create)
        .unify()
        .or(tag_detail)
        .unify()
        .or(ingredient_list)
        .unify()
        .or(ingredient_create)
        .unify()
        .or(ingredient_detail)
        .unify()
        .boxed()
}

async fn list_tags(state: SharedState) -> Result<Response, Rejection> {
    let list = tags::list_tags(&state.pool, &state.cache).await?;
    Ok(json(&list))
}

async fn get_tag(id: Id, state: SharedState) -> Result<Response, Rejection> {
    let Some(tag) = tags::get_tag(&state.pool, id).await? else {
        return Err(HtmlError::NotFound.default().into());
    };
    Ok(json(&tag))
}

async fn create_tag(
    session: SessionData,
    form: TagForm,
    state: SharedState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;
    let tag = tags::create_tag(&state.pool, &state.cache, form.validate()?).await?;
    Ok(created(&tag))
}

async fn list_ingredients(query: QueryPairs, state: SharedState) -> Result<Response, Rejection> {
    let form = Form::from_data(query);
    let list =
        ingredients::search_ingredients(&state.pool, &state.cache, form.get_str("name")).await?;
    Ok(json(&list))
}

async fn get_ingredient(id: Id, state: SharedState) -> Result<Response, Rejection> {
    let Some(ingredient) = ingredients::get_ingredient(&state.pool, id).await? else {
        return Err(HtmlError::NotFound.default().into());
    };
    Ok(json(&ingredient))
}

async fn create_ingredient(
    session: SessionData,
    form: IngredientForm,
    state: SharedState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;
    let ingredient =
        ingredients::create_ingredient(&state.pool, &state.cache, form.validate()?).await?;
    Ok(created(&ingredient))
}
