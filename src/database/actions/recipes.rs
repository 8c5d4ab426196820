use crate::{
    actions::attributes::{list_recipe_attributes, set_recipe_attributes},
    error::ApiError,
    filters::RecipeFilter,
    form::RecipePayload,
    pagination::PageContext,
    schema::{AttributeKind, Recipe, RecipeDetail, RecipeRow, RecipeSummary, Uuid, RECIPE_COLUMNS},
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

fn recipe_query(select: &str, user_id: Uuid, filter: &RecipeFilter) -> QueryBuilder<'static, Postgres> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {select} FROM recipes r WHERE r.user_id = "));
    query.push_bind(user_id);
    filter.push_conditions(&mut query);
    query
}

pub async fn list_recipes(
    user_id: Uuid,
    filter: &RecipeFilter,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeSummary>, ApiError> {
    let mut query = recipe_query(
        &format!("{RECIPE_COLUMNS}, COUNT(*) OVER() AS count"),
        user_id,
        filter,
    );
    filter.ordering.push_order_by(&mut query);
    filter.page.push_limit(&mut query);

    let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(pool).await?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if filter.page.offset > 0 => {
            let (count,): (i64,) = recipe_query("COUNT(*)", user_id, filter)
                .build_query_as()
                .fetch_one(pool)
                .await?;
            count
        }
        None => 0,
    };

    let ids: Vec<Uuid> = rows.iter().map(|row| row.recipe.id).collect();
    let mut tags = list_recipe_attributes(AttributeKind::Tag, &ids, pool).await?;
    let mut ingredients = list_recipe_attributes(AttributeKind::Ingredient, &ids, pool).await?;

    let rows = rows
        .into_iter()
        .map(|row| {
            let id = row.recipe.id;
            row.recipe.summary(
                tags.remove(&id).unwrap_or_default(),
                ingredients.remove(&id).unwrap_or_default(),
            )
        })
        .collect();

    Ok(PageContext::from_rows(rows, total_count, filter.page))
}

pub async fn get_recipe(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1 AND r.user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_recipe_detail(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeDetail>, ApiError> {
    let recipe = match get_recipe(id, user_id, pool).await? {
        Some(recipe) => recipe,
        None => return Ok(None),
    };

    let mut tags = list_recipe_attributes(AttributeKind::Tag, &[id], pool).await?;
    let mut ingredients = list_recipe_attributes(AttributeKind::Ingredient, &[id], pool).await?;

    Ok(Some(recipe.detail(
        tags.remove(&id).unwrap_or_default(),
        ingredients.remove(&id).unwrap_or_default(),
    )))
}

async fn set_linked_attributes(
    recipe_id: Uuid,
    user_id: Uuid,
    payload: &RecipePayload,
    conn: &mut PgConnection,
) -> Result<(), ApiError> {
    if let Some(tags) = &payload.tags {
        set_recipe_attributes(AttributeKind::Tag, recipe_id, user_id, tags, conn).await?;
    }
    if let Some(ingredients) = &payload.ingredients {
        set_recipe_attributes(AttributeKind::Ingredient, recipe_id, user_id, ingredients, conn)
            .await?;
    }
    Ok(())
}

/// Creates a recipe with its tags and ingredients in one transaction.
/// The payload must have been validated as a full (non partial) form.
pub async fn create_recipe(
    user_id: Uuid,
    payload: RecipePayload,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    let mut tx = pool.begin().await?;

    let (recipe_id,): (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (user_id, title, description, time_minutes, price, link)
        VALUES ($1, $2, COALESCE($3, ''), $4, $5::NUMERIC, COALESCE($6, ''))
        RETURNING id
    ",
    )
    .bind(user_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.time_minutes)
    .bind(&payload.price)
    .bind(&payload.link)
    .fetch_one(&mut *tx)
    .await?;

    set_linked_attributes(recipe_id, user_id, &payload, &mut tx).await?;
    tx.commit().await?;

    get_recipe_detail(recipe_id, user_id, pool)
        .await?
        .ok_or(ApiError::NotFound)
}

/// Applies the present fields of `payload`. `None` means the recipe is not the caller's.
pub async fn update_recipe(
    id: Uuid,
    user_id: Uuid,
    payload: RecipePayload,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeDetail>, ApiError> {
    let mut tx = pool.begin().await?;

    let updated: Option<(Uuid,)> = sqlx::query_as(
        "
        UPDATE recipes SET
        title = COALESCE($1, title),
        description = COALESCE($2, description),
        time_minutes = COALESCE($3, time_minutes),
        price = COALESCE($4::NUMERIC, price),
        link = COALESCE($5, link)
        WHERE id = $6 AND user_id = $7
        RETURNING id
    ",
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.time_minutes)
    .bind(&payload.price)
    .bind(&payload.link)
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    if updated.is_none() {
        return Ok(None);
    }

    set_linked_attributes(id, user_id, &payload, &mut tx).await?;
    tx.commit().await?;

    get_recipe_detail(id, user_id, pool).await
}

pub async fn delete_recipe(id: Uuid, user_id: Uuid, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Points the recipe's image at a stored file, relative to the media root.
pub async fn set_recipe_image(
    id: Uuid,
    user_id: Uuid,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as(&format!(
        "UPDATE recipes AS r SET image = $1 WHERE r.id = $2 AND r.user_id = $3 RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(image)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
