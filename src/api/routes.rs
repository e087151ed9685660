use std::convert::Infallible;

use warp::{reply::Reply, Filter};

use crate::state::SharedState;

use super::{recipes, reference, reply::recover, users};

/// The full api plus `/media/` file serving, with json error rendering and request logging.
pub fn api(
    state: SharedState,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media")
        .and(warp::fs::dir(state.media.root().to_path_buf()))
        .map(Reply::into_response);

    users::routes(state.clone())
        .or(reference::routes(state.clone()))
        .unify()
        .or(recipes::routes(state))
        .unify()
        .or(media)
        .unify()
        .recover(recover)
        .unify()
        .with(warp::log("foodgram::api"))
}
