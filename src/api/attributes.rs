use std::convert::Infallible;

use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection, Reply};

use super::routes::{json_body, with_context, Context};
use crate::{
    actions::attributes as actions,
    error::ApiError,
    filters::{AttributeFilter, QueryParams},
    form::{AttributePayload, FormData},
    jwt::SessionData,
    middleware::with_session,
    schema::{AttributeKind, Uuid},
};

fn with_kind(kind: AttributeKind) -> impl Filter<Extract = (AttributeKind,), Error = Infallible> + Clone {
    warp::any().map(move || kind)
}

/// List, retrieve, update and delete for tags or ingredients, mounted at
/// `/tags/` or `/ingredients/`.
pub fn routes(kind: AttributeKind, ctx: Context) -> BoxedFilter<(Response,)> {
    let key = ctx.session_key.clone();
    let max_json_bytes = ctx.config.max_json_bytes;
    let collection = warp::path(kind.field()).and(warp::path::end());
    let item = warp::path(kind.field())
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end());

    let list = collection
        .and(warp::get())
        .and(with_kind(kind))
        .and(with_session(key.clone()))
        .and(warp::query::<QueryParams>())
        .and(with_context(ctx.clone()))
        .and_then(list_attributes);

    let retrieve = item
        .clone()
        .and(warp::get())
        .and(with_kind(kind))
        .and(with_session(key.clone()))
        .and(with_context(ctx.clone()))
        .and_then(retrieve_attribute);

    let put = item
        .clone()
        .and(warp::put())
        .and(with_kind(kind))
        .and(with_session(key.clone()))
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(put_attribute);

    let patch = item
        .clone()
        .and(warp::patch())
        .and(with_kind(kind))
        .and(with_session(key.clone()))
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(patch_attribute);

    let delete = item
        .and(warp::delete())
        .and(with_kind(kind))
        .and(with_session(key))
        .and(with_context(ctx))
        .and_then(delete_attribute);

    list.or(retrieve)
        .unify()
        .or(put)
        .unify()
        .or(patch)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

async fn list_attributes(
    kind: AttributeKind,
    session: SessionData,
    params: QueryParams,
    ctx: Context,
) -> Result<Response, Rejection> {
    let filter = AttributeFilter::from_query(&params, ctx.config.page_size)?;
    let page = actions::list_attributes(kind, session.user_id, &filter, &ctx.pool).await?;

    Ok(warp::reply::json(&page).into_response())
}

async fn retrieve_attribute(
    id: Uuid,
    kind: AttributeKind,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    let attribute = actions::get_attribute(kind, id, session.user_id, &ctx.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(warp::reply::json(&attribute).into_response())
}

async fn put_attribute(
    id: Uuid,
    kind: AttributeKind,
    session: SessionData,
    data: FormData,
    ctx: Context,
) -> Result<Response, Rejection> {
    update_attribute(id, kind, session, data, ctx, false).await
}

async fn patch_attribute(
    id: Uuid,
    kind: AttributeKind,
    session: SessionData,
    data: FormData,
    ctx: Context,
) -> Result<Response, Rejection> {
    update_attribute(id, kind, session, data, ctx, true).await
}

async fn update_attribute(
    id: Uuid,
    kind: AttributeKind,
    session: SessionData,
    data: FormData,
    ctx: Context,
    partial: bool,
) -> Result<Response, Rejection> {
    actions::get_attribute(kind, id, session.user_id, &ctx.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    let payload = AttributePayload::from_data(data, partial)?;
    let attribute = actions::update_attribute(kind, id, session.user_id, payload.name, &ctx.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(warp::reply::json(&attribute).into_response())
}

async fn delete_attribute(
    id: Uuid,
    kind: AttributeKind,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    if !actions::delete_attribute(kind, id, session.user_id, &ctx.pool).await? {
        return Err(ApiError::NotFound.into());
    }

    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT).into_response())
}
