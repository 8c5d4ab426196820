use std::collections::HashMap;

use crate::{
    error::ApiError,
    filters::AttributeFilter,
    pagination::PageContext,
    schema::{Attribute, AttributeKind, AttributeRow, LinkedAttribute, Uuid},
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

fn attribute_query(
    select: &str,
    kind: AttributeKind,
    user_id: Uuid,
    filter: &AttributeFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {select} FROM {table} a WHERE a.user_id = ",
        table = kind.table()
    ));
    query.push_bind(user_id);
    filter.push_conditions(kind, &mut query);
    query
}

pub async fn list_attributes(
    kind: AttributeKind,
    user_id: Uuid,
    filter: &AttributeFilter,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Attribute>, ApiError> {
    let mut query = attribute_query("a.id, a.name, COUNT(*) OVER() AS count", kind, user_id, filter);
    filter.ordering.push_order_by(&mut query);
    filter.page.push_limit(&mut query);

    let rows: Vec<AttributeRow> = query.build_query_as().fetch_all(pool).await?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if filter.page.offset > 0 => {
            let (count,): (i64,) = attribute_query("COUNT(*)", kind, user_id, filter)
                .build_query_as()
                .fetch_one(pool)
                .await?;
            count
        }
        None => 0,
    };

    let rows = rows.into_iter().map(Attribute::from).collect();
    Ok(PageContext::from_rows(rows, total_count, filter.page))
}

pub async fn get_attribute(
    kind: AttributeKind,
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Attribute>, ApiError> {
    let row: Option<Attribute> = sqlx::query_as(&format!(
        "SELECT id, name FROM {} WHERE id = $1 AND user_id = $2",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Renames the attribute when `name` is given. `None` means it is not the caller's.
pub async fn update_attribute(
    kind: AttributeKind,
    id: Uuid,
    user_id: Uuid,
    name: Option<String>,
    pool: &Pool<Postgres>,
) -> Result<Option<Attribute>, ApiError> {
    let row: Option<Attribute> = sqlx::query_as(&format!(
        "UPDATE {} SET name = COALESCE($1, name) WHERE id = $2 AND user_id = $3 RETURNING id, name",
        kind.table()
    ))
    .bind(name)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn delete_attribute(
    kind: AttributeKind,
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE id = $1 AND user_id = $2",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Finds the caller's attribute by exact name, creating it when missing.
pub async fn get_or_create_attribute(
    kind: AttributeKind,
    user_id: Uuid,
    name: &str,
    conn: &mut PgConnection,
) -> Result<Uuid, ApiError> {
    let existing: Option<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT id FROM {} WHERE user_id = $1 AND name = $2 ORDER BY id LIMIT 1",
        kind.table()
    ))
    .bind(user_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) = sqlx::query_as(&format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id",
        kind.table()
    ))
    .bind(user_id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Replaces the recipe's linked set of `kind` with the named attributes.
pub async fn set_recipe_attributes(
    kind: AttributeKind,
    recipe_id: Uuid,
    user_id: Uuid,
    names: &[String],
    conn: &mut PgConnection,
) -> Result<(), ApiError> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE recipe_id = $1",
        kind.link_table()
    ))
    .bind(recipe_id)
    .execute(&mut *conn)
    .await?;

    for name in names {
        let id = get_or_create_attribute(kind, user_id, name, conn).await?;

        sqlx::query(&format!(
            "INSERT INTO {} (recipe_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        ))
        .bind(recipe_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Attributes of `kind` linked to each of the given recipes.
pub async fn list_recipe_attributes(
    kind: AttributeKind,
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<Attribute>>, ApiError> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<LinkedAttribute> = sqlx::query_as(&format!(
        "
        SELECT l.recipe_id AS recipe_id, a.id AS id, a.name AS name
        FROM {link} l
        INNER JOIN {table} a ON a.id = l.{column}
        WHERE l.recipe_id = ANY($1)
        ORDER BY a.id
    ",
        link = kind.link_table(),
        table = kind.table(),
        column = kind.link_column(),
    ))
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    let mut hashmap: HashMap<Uuid, Vec<Attribute>> = HashMap::new();
    for row in rows {
        hashmap.entry(row.recipe_id).or_default().push(Attribute {
            id: row.id,
            name: row.name,
        });
    }
    Ok(hashmap)
}
