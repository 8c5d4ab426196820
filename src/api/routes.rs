use std::{convert::Infallible, sync::Arc};

use serde_json::json;
use sqlx::PgPool;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, UnsupportedMediaType,
    },
    reply::Response,
    Filter, Rejection, Reply,
};

use super::{attributes, recipes, users};
use crate::{
    config::Config, connection::check_health, error::ApiError, form::FormData, jwt::SessionKey,
    schema::AttributeKind,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct Context {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub session_key: SessionKey,
}

impl Context {
    pub fn new(pool: PgPool, config: Config) -> Result<Self, ApiError> {
        let session_key = SessionKey::new(&config.secret_key, config.token_ttl_hours)?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            session_key,
        })
    }
}

/// A JSON object body of at most `max_length` bytes. Larger bodies are a 413.
pub fn json_body(max_length: u64) -> impl Filter<Extract = (FormData,), Error = Rejection> + Clone {
    warp::body::content_length_limit(max_length).and(warp::body::json::<FormData>())
}

pub fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Every endpoint of the service, with rejections rendered as JSON.
pub fn routes(ctx: Context) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media").and(warp::fs::dir(ctx.config.media_root.clone()));

    health(ctx.clone())
        .or(recipes::routes(ctx.clone()))
        .unify()
        .or(attributes::routes(AttributeKind::Tag, ctx.clone()))
        .unify()
        .or(attributes::routes(AttributeKind::Ingredient, ctx.clone()))
        .unify()
        .or(users::routes(ctx))
        .unify()
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("recipe_api"))
}

fn health(ctx: Context) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(|ctx: Context| async move {
            let response = if check_health(&ctx.pool).await {
                warp::reply::json(&json!({ "status": "ok" })).into_response()
            } else {
                warp::reply::with_status(
                    warp::reply::json(&json!({ "status": "unavailable" })),
                    StatusCode::SERVICE_UNAVAILABLE,
                )
                .into_response()
            };
            Ok::<_, Rejection>(response)
        })
}

fn detail(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&json!({ "detail": message })), status)
        .into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let response = if let Some(e) = err.find::<ApiError>() {
        e.to_response()
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        detail(StatusCode::BAD_REQUEST, &format!("JSON parse error - {e}"))
    } else if err.find::<PayloadTooLarge>().is_some() {
        detail(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large.")
    } else if err.find::<LengthRequired>().is_some() {
        detail(StatusCode::LENGTH_REQUIRED, "Content-Length header is required.")
    } else if err.find::<UnsupportedMediaType>().is_some() {
        detail(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported media type in request.",
        )
    } else if err.find::<InvalidQuery>().is_some() {
        detail(StatusCode::BAD_REQUEST, "Malformed query string.")
    } else if let Some(e) = err.find::<InvalidHeader>() {
        detail(StatusCode::BAD_REQUEST, &e.to_string())
    } else if let Some(e) = err.find::<MissingHeader>() {
        detail(StatusCode::BAD_REQUEST, &e.to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        detail(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else if err.is_not_found() {
        detail(StatusCode::NOT_FOUND, "Not found.")
    } else {
        log::error!("> Unhandled rejection: {err:?}");
        detail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "A server error occurred.",
        )
    };

    Ok(response)
}
