use serde_json::json;
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection, Reply};

use super::routes::{json_body, with_context, Context};
use crate::{
    actions::users as actions,
    error::{ApiError, FieldErrors},
    form::{normalize_email, FormData, TokenPayload, UserPayload},
    jwt::SessionData,
    middleware::with_session,
    schema::{User, UserProfile},
};

const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";
const USER_GONE: &str = "User inactive or deleted.";

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let key = ctx.session_key.clone();
    let max_json_bytes = ctx.config.max_json_bytes;

    let create = warp::path!("user" / "create")
        .or(warp::path!("user" / "create-gapi-view"))
        .unify()
        .and(warp::post())
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(create_user);

    let token = warp::path!("user" / "token")
        .and(warp::post())
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(create_token);

    let me = warp::path!("user" / "me")
        .or(warp::path!("user" / "me-api-view"))
        .unify();

    let me_get = me
        .clone()
        .and(warp::get())
        .and(with_session(key.clone()))
        .and(with_context(ctx.clone()))
        .and_then(retrieve_me);

    let me_put = me
        .clone()
        .and(warp::put())
        .and(with_session(key.clone()))
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(put_me);

    let me_patch = me
        .and(warp::patch())
        .and(with_session(key))
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(patch_me);

    let list = warp::path!("user" / "list-users")
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(list_users);

    create
        .or(token)
        .unify()
        .or(me_get)
        .unify()
        .or(me_put)
        .unify()
        .or(me_patch)
        .unify()
        .or(list)
        .unify()
        .boxed()
}

async fn create_user(data: FormData, ctx: Context) -> Result<Response, Rejection> {
    let payload = UserPayload::from_data(data, false)?;
    let user = actions::register_user(payload, &ctx.pool).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&UserProfile::from(&user)),
        StatusCode::CREATED,
    )
    .into_response())
}

async fn create_token(data: FormData, ctx: Context) -> Result<Response, Rejection> {
    let payload = TokenPayload::from_data(data)?;
    let email = normalize_email(&payload.email).unwrap_or(payload.email);

    let user = actions::authenticate_user(&email, &payload.password, &ctx.pool)
        .await?
        .ok_or_else(|| ApiError::Validation(FieldErrors::single("non_field_errors", BAD_CREDENTIALS)))?;

    let token = ctx.session_key.generate_session(&user)?;
    Ok(warp::reply::json(&json!({ "token": token })).into_response())
}

/// The account behind the session, as long as it still exists and is active.
async fn session_user(session: &SessionData, ctx: &Context) -> Result<User, ApiError> {
    match actions::get_user_by_id(&ctx.pool, session.user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(ApiError::Unauthenticated(USER_GONE)),
    }
}

async fn retrieve_me(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let user = session_user(&session, &ctx).await?;

    Ok(warp::reply::json(&UserProfile::from(&user)).into_response())
}

async fn put_me(session: SessionData, data: FormData, ctx: Context) -> Result<Response, Rejection> {
    update_me(session, data, ctx, false).await
}

async fn patch_me(session: SessionData, data: FormData, ctx: Context) -> Result<Response, Rejection> {
    update_me(session, data, ctx, true).await
}

async fn update_me(
    session: SessionData,
    data: FormData,
    ctx: Context,
    partial: bool,
) -> Result<Response, Rejection> {
    let user = session_user(&session, &ctx).await?;

    let payload = UserPayload::from_data(data, partial)?;
    let user = actions::update_user(user.id, payload, &ctx.pool)
        .await?
        .ok_or(ApiError::Unauthenticated(USER_GONE))?;

    Ok(warp::reply::json(&UserProfile::from(&user)).into_response())
}

async fn list_users(ctx: Context) -> Result<Response, Rejection> {
    let users = actions::list_users(&ctx.pool).await?;

    Ok(warp::reply::json(&users).into_response())
}
