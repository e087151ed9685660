use std::convert::Infallible;

use serde::Serialize;
use serde_json::json;
use warp::{
    http::{header, StatusCode},
    reject::Rejection,
    reply::{self, Reply, Response},
};

use crate::error::{Error, HtmlError};

/// Largest accepted json body; recipe images travel inline as base64.
pub const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

pub fn json<T: Serialize>(value: &T) -> Response {
    reply::json(value).into_response()
}

pub fn created<T: Serialize>(value: &T) -> Response {
    reply::with_status(reply::json(value), StatusCode::CREATED).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// `text/plain` download named `filename`.
pub fn attachment(body: String, filename: &str) -> Response {
    let reply = reply::with_header(body, header::CONTENT_TYPE, "text/plain; charset=utf-8");
    reply::with_header(
        reply,
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{filename}\""),
    )
    .into_response()
}

fn error_reply(error: &Error) -> Response {
    reply::with_status(reply::json(&error.body()), error.status()).into_response()
}

/// Renders every rejection as a json error body.
pub async fn recover(rejection: Rejection) -> Result<Response, Infallible> {
    if let Some(error) = rejection.find::<Error>() {
        if error.code >= 500 {
            log::error!("Request failed: {error}");
        }
        return Ok(error_reply(error));
    }

    if rejection.is_not_found() {
        return Ok(error_reply(&HtmlError::NotFound.default()));
    }

    if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(&HtmlError::InvalidRequest.new(&e.to_string())));
    }

    if let Some(e) = rejection.find::<warp::reject::InvalidQuery>() {
        return Ok(error_reply(&HtmlError::InvalidRequest.new(&e.to_string())));
    }

    if let Some(e) = rejection.find::<warp::reject::InvalidHeader>() {
        return Ok(error_reply(&HtmlError::InvalidRequest.new(&e.to_string())));
    }

    if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(&HtmlError::MethodNotAllowed.default()));
    }

    if let Some(e) = rejection.find::<warp::reject::PayloadTooLarge>() {
        let body = json!({ "detail": e.to_string() });
        return Ok(reply::with_status(reply::json(&body), StatusCode::PAYLOAD_TOO_LARGE).into_response());
    }

    if let Some(e) = rejection.find::<warp::reject::UnsupportedMediaType>() {
        let body = json!({ "detail": e.to_string() });
        return Ok(
            reply::with_status(reply::json(&body), StatusCode::UNSUPPORTED_MEDIA_TYPE)
                .into_response(),
        );
    }

    if let Some(e) = rejection.find::<warp::reject::LengthRequired>() {
        return Ok(error_reply(&HtmlError::InvalidRequest.new(&e.to_string())));
    }

    log::error!("Unhandled rejection: {rejection:?}");
    Ok(error_reply(&HtmlError::InternalServerError.default()))
}
