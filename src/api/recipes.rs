use bytes::BufMut;
use futures::TryStreamExt;
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    multipart::FormData as MultipartForm,
    reply::Response,
    Filter, Rejection, Reply,
};

use super::routes::{json_body, with_context, Context};
use crate::{
    actions::recipes as actions,
    error::ApiError,
    filters::{QueryParams, RecipeFilter},
    form::{FormData, RecipePayload},
    jwt::SessionData,
    media::{check_image, remove_image, store_image},
    middleware::with_session,
    schema::{RecipeImage, Uuid},
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let key = ctx.session_key.clone();
    let max_json_bytes = ctx.config.max_json_bytes;
    let max_upload_bytes = ctx.config.max_upload_bytes;

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_session(key.clone()))
        .and(warp::query::<QueryParams>())
        .and(with_context(ctx.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(key.clone()))
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(create_recipe);

    let retrieve = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_session(key.clone()))
        .and(with_context(ctx.clone()))
        .and_then(retrieve_recipe);

    let put = warp::path!("recipes" / Uuid)
        .and(warp::put())
        .and(with_session(key.clone()))
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(put_recipe);

    let patch = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(key.clone()))
        .and(json_body(max_json_bytes))
        .and(with_context(ctx.clone()))
        .and_then(patch_recipe);

    let delete = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(key.clone()))
        .and(with_context(ctx.clone()))
        .and_then(delete_recipe);

    let upload = warp::path!("recipes" / Uuid / "upload-image")
        .and(warp::post())
        .and(with_session(key))
        .and(image_form(max_upload_bytes))
        .and(with_context(ctx))
        .and_then(upload_image);

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(put)
        .unify()
        .or(patch)
        .unify()
        .or(delete)
        .unify()
        .or(upload)
        .unify()
        .boxed()
}

/// The multipart body when one was sent, `None` for any other content type.
fn image_form(
    max_length: u64,
) -> impl Filter<Extract = (Option<MultipartForm>,), Error = Rejection> + Clone {
    let multipart = warp::multipart::form().max_length(max_length).map(Some);

    // rejects as not found so the multipart filter's own rejection wins
    let other = warp::header::optional::<String>("content-type")
        .and_then(|content_type: Option<String>| async move {
            match content_type {
                Some(ct) if ct.to_ascii_lowercase().starts_with("multipart/") => {
                    Err(warp::reject::not_found())
                }
                _ => Ok(()),
            }
        })
        .map(|()| None::<MultipartForm>);

    multipart.or(other).unify()
}

async fn list_recipes(
    session: SessionData,
    params: QueryParams,
    ctx: Context,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_query(&params, ctx.config.page_size)?;
    let page = actions::list_recipes(session.user_id, &filter, &ctx.pool).await?;

    Ok(warp::reply::json(&page).into_response())
}

async fn create_recipe(
    session: SessionData,
    data: FormData,
    ctx: Context,
) -> Result<Response, Rejection> {
    let payload = RecipePayload::from_data(data, false)?;
    let recipe = actions::create_recipe(session.user_id, payload, &ctx.pool).await?;

    log::info!("> Created recipe {} for user {}", recipe.summary.id, session.user_id);
    Ok(warp::reply::with_status(warp::reply::json(&recipe), StatusCode::CREATED).into_response())
}

async fn retrieve_recipe(id: Uuid, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let recipe = actions::get_recipe_detail(id, session.user_id, &ctx.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(warp::reply::json(&recipe).into_response())
}

async fn put_recipe(
    id: Uuid,
    session: SessionData,
    data: FormData,
    ctx: Context,
) -> Result<Response, Rejection> {
    update_recipe(id, session, data, ctx, false).await
}

async fn patch_recipe(
    id: Uuid,
    session: SessionData,
    data: FormData,
    ctx: Context,
) -> Result<Response, Rejection> {
    update_recipe(id, session, data, ctx, true).await
}

async fn update_recipe(
    id: Uuid,
    session: SessionData,
    data: FormData,
    ctx: Context,
    partial: bool,
) -> Result<Response, Rejection> {
    actions::get_recipe(id, session.user_id, &ctx.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    let payload = RecipePayload::from_data(data, partial)?;
    let recipe = actions::update_recipe(id, session.user_id, payload, &ctx.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(warp::reply::json(&recipe).into_response())
}

async fn delete_recipe(id: Uuid, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let recipe = actions::get_recipe(id, session.user_id, &ctx.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !actions::delete_recipe(id, session.user_id, &ctx.pool).await? {
        return Err(ApiError::NotFound.into());
    }
    if let Some(image) = &recipe.image {
        remove_image(&ctx.config.media_root, image).await;
    }

    log::info!("> Deleted recipe {id}");
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT).into_response())
}

/// Reads the `image` file part out of a multipart body.
async fn read_image_part(form: MultipartForm) -> Result<Option<Vec<u8>>, ApiError> {
    let parts: Vec<(String, Option<String>, Vec<u8>)> = form
        .and_then(|part| async move {
            let name = part.name().to_string();
            let filename = part.filename().map(str::to_string);
            let data = part
                .stream()
                .try_fold(Vec::new(), |mut acc, buf| async move {
                    acc.put(buf);
                    Ok::<_, warp::Error>(acc)
                })
                .await?;
            Ok::<_, warp::Error>((name, filename, data))
        })
        .try_collect()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart form parse error - {e}")))?;

    match parts.into_iter().find(|(name, _, _)| name == "image") {
        Some((_, Some(_), data)) => Ok(Some(data)),
        Some((_, None, _)) => Err(ApiError::field(
            "image",
            "The submitted data was not a file. Check the encoding type on the form.",
        )),
        None => Ok(None),
    }
}

async fn upload_image(
    id: Uuid,
    session: SessionData,
    form: Option<MultipartForm>,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipe = actions::get_recipe(id, session.user_id, &ctx.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    let data = match form {
        Some(form) => read_image_part(form).await?,
        None => None,
    };
    let data = data.ok_or_else(|| ApiError::field("image", "No file was submitted."))?;
    let kind = check_image(&data)?;

    let media_root = &ctx.config.media_root;
    let path = store_image(media_root, &data, kind).await?;

    let updated = match actions::set_recipe_image(id, session.user_id, &path, &ctx.pool).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            remove_image(media_root, &path).await;
            return Err(ApiError::NotFound.into());
        }
        Err(e) => {
            remove_image(media_root, &path).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = &recipe.image {
        remove_image(media_root, previous).await;
    }

    let body = RecipeImage {
        id: updated.id,
        image: updated.image_url(),
    };
    Ok(warp::reply::json(&body).into_response())
}
