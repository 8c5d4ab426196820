use std::collections::HashMap;

use sqlx::{Postgres, QueryBuilder};

use super::{
    error::{ApiError, FieldErrors},
    pagination::Page,
    schema::AttributeKind,
};
use crate::constants::{ATTRIBUTE_DEFAULT_ORDERING, RECIPE_DEFAULT_ORDERING};

pub type QueryParams = HashMap<String, String>;

/// A column a list may be ordered by, named the way clients name it.
pub trait OrderField: Sized + Copy + PartialEq {
    /// Unique column appended last so equal keys page deterministically.
    const TIEBREAKER: Self;

    fn parse(name: &str) -> Option<Self>;
    fn column(self) -> &'static str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipeOrderField {
    Id,
    TimeMinutes,
    Price,
}

impl OrderField for RecipeOrderField {
    const TIEBREAKER: Self = Self::Id;

    fn parse(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Self::Id),
            "time_minutes" => Some(Self::TimeMinutes),
            "price" => Some(Self::Price),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Id => "r.id",
            Self::TimeMinutes => "r.time_minutes",
            Self::Price => "r.price",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeOrderField {
    Id,
    Name,
}

impl OrderField for AttributeOrderField {
    const TIEBREAKER: Self = Self::Id;

    fn parse(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Id => "a.id",
            Self::Name => "a.name",
        }
    }
}

/// `ordering=price,-id` style ordering. Unknown fields are dropped; when nothing
/// usable is left the default applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering<F> {
    /// `(field, descending)`
    pub fields: Vec<(F, bool)>,
}

impl<F: OrderField> Ordering<F> {
    pub fn parse(raw: Option<&str>, default: &str) -> Self {
        let fields = raw.map(Self::parse_list).unwrap_or_default();
        if fields.is_empty() {
            return Self {
                fields: Self::parse_list(default),
            };
        }
        Self { fields }
    }

    fn parse_list(raw: &str) -> Vec<(F, bool)> {
        raw.split(',')
            .map(str::trim)
            .filter_map(|term| {
                let (descending, name) = match term.strip_prefix('-') {
                    Some(name) => (true, name),
                    None => (false, term),
                };
                F::parse(name).map(|field| (field, descending))
            })
            .collect()
    }

    pub fn push_order_by(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if self.fields.is_empty() {
            return;
        }

        query.push(" ORDER BY ");
        let mut separated = query.separated(", ");
        for (field, descending) in &self.fields {
            if *descending {
                separated.push(format!("{} DESC", field.column()));
            } else {
                separated.push(field.column());
            }
        }
        if !self.fields.iter().any(|(field, _)| *field == F::TIEBREAKER) {
            separated.push(F::TIEBREAKER.column());
        }
    }
}

/// Splits a `search` value into terms on whitespace and commas.
pub fn search_terms(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .replace('\0', "")
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// Case-insensitive substring pattern for ILIKE, with wildcards in the term escaped.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Parses a comma separated id list. An empty value means "no filter".
pub fn parse_id_list(params: &QueryParams, key: &str, errors: &mut FieldErrors) -> Option<Vec<i32>> {
    let raw = params.get(key).map(|value| value.trim())?;
    if raw.is_empty() {
        return None;
    }

    let ids: Result<Vec<i32>, _> = raw.split(',').map(|id| id.trim().parse::<i32>()).collect();
    match ids {
        Ok(ids) => Some(ids),
        Err(_) => {
            errors.add(key, "Enter a number.");
            None
        }
    }
}

fn parse_flag(params: &QueryParams, key: &str, errors: &mut FieldErrors) -> bool {
    match params.get(key).map(|value| value.trim()) {
        None | Some("") => false,
        Some(value) => match value.parse::<i64>() {
            Ok(n) => n != 0,
            Err(_) => {
                errors.add(key, "A valid integer is required.");
                false
            }
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<i32>>,
    pub ingredients: Option<Vec<i32>>,
    pub search: Vec<String>,
    pub ordering: Ordering<RecipeOrderField>,
    pub page: Page,
}

impl RecipeFilter {
    pub fn from_query(params: &QueryParams, default_limit: i64) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();

        let filter = Self {
            tags: parse_id_list(params, "tags", &mut errors),
            ingredients: parse_id_list(params, "ingredients", &mut errors),
            search: search_terms(params.get("search").map(String::as_str)),
            ordering: Ordering::parse(
                params.get("ordering").map(String::as_str),
                RECIPE_DEFAULT_ORDERING,
            ),
            page: Page::from_query(params, default_limit, &mut errors),
        };

        errors.into_result(filter)
    }

    /// Appends ` AND ...` clauses over the recipe alias `r`.
    pub fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(tags) = &self.tags {
            push_linked_to(query, AttributeKind::Tag, tags);
        }
        if let Some(ingredients) = &self.ingredients {
            push_linked_to(query, AttributeKind::Ingredient, ingredients);
        }

        for term in &self.search {
            let pattern = like_pattern(term);

            query.push(" AND (r.title ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR r.description ILIKE ");
            query.push_bind(pattern.clone());
            for kind in [AttributeKind::Tag, AttributeKind::Ingredient] {
                query.push(format!(
                    " OR EXISTS (SELECT 1 FROM {link} l INNER JOIN {table} a ON a.id = l.{column} WHERE l.recipe_id = r.id AND a.name ILIKE ",
                    link = kind.link_table(),
                    table = kind.table(),
                    column = kind.link_column(),
                ));
                query.push_bind(pattern.clone());
                query.push(")");
            }
            query.push(")");
        }
    }
}

fn push_linked_to(query: &mut QueryBuilder<'_, Postgres>, kind: AttributeKind, ids: &[i32]) {
    query.push(format!(
        " AND EXISTS (SELECT 1 FROM {link} l WHERE l.recipe_id = r.id AND l.{column} = ANY(",
        link = kind.link_table(),
        column = kind.link_column(),
    ));
    query.push_bind(ids.to_vec());
    query.push("))");
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeFilter {
    pub assigned_only: bool,
    pub search: Vec<String>,
    pub ordering: Ordering<AttributeOrderField>,
    pub page: Page,
}

impl AttributeFilter {
    pub fn from_query(params: &QueryParams, default_limit: i64) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();

        let filter = Self {
            assigned_only: parse_flag(params, "assigned_only", &mut errors),
            search: search_terms(params.get("search").map(String::as_str)),
            ordering: Ordering::parse(
                params.get("ordering").map(String::as_str),
                ATTRIBUTE_DEFAULT_ORDERING,
            ),
            page: Page::from_query(params, default_limit, &mut errors),
        };

        errors.into_result(filter)
    }

    /// Appends ` AND ...` clauses over the attribute alias `a`.
    pub fn push_conditions(&self, kind: AttributeKind, query: &mut QueryBuilder<'_, Postgres>) {
        if self.assigned_only {
            query.push(format!(
                " AND EXISTS (SELECT 1 FROM {link} l WHERE l.{column} = a.id)",
                link = kind.link_table(),
                column = kind.link_column(),
            ));
        }

        for term in &self.search {
            query.push(" AND a.name ILIKE ");
            query.push_bind(like_pattern(term));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn errors_of<T: std::fmt::Debug>(result: Result<T, ApiError>) -> FieldErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn id_lists_parse_with_in_semantics() {
        let filter =
            RecipeFilter::from_query(&params(&[("tags", "1, 2"), ("ingredients", "")]), 10)
                .unwrap();

        assert_eq!(filter.tags, Some(vec![1, 2]));
        assert_eq!(filter.ingredients, None);
    }

    #[test]
    fn non_numeric_ids_are_field_errors() {
        let errors = errors_of(RecipeFilter::from_query(
            &params(&[("tags", "1,two"), ("ingredients", "3")]),
            10,
        ));

        assert_eq!(errors.get("tags"), Some(&[String::from("Enter a number.")][..]));
        assert!(!errors.contains("ingredients"));
    }

    #[test]
    fn recipe_ordering_defaults_to_newest_first() {
        let filter = RecipeFilter::from_query(&params(&[]), 10).unwrap();
        assert_eq!(filter.ordering.fields, vec![(RecipeOrderField::Id, true)]);

        let filter =
            RecipeFilter::from_query(&params(&[("ordering", "title,-bogus")]), 10).unwrap();
        assert_eq!(filter.ordering.fields, vec![(RecipeOrderField::Id, true)]);
    }

    #[test]
    fn recipe_ordering_keeps_known_fields_in_order() {
        let ordering: Ordering<RecipeOrderField> =
            Ordering::parse(Some("price, -time_minutes,unknown"), RECIPE_DEFAULT_ORDERING);
        assert_eq!(
            ordering.fields,
            vec![
                (RecipeOrderField::Price, false),
                (RecipeOrderField::TimeMinutes, true)
            ]
        );

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1");
        ordering.push_order_by(&mut query);
        assert_eq!(query.sql(), "SELECT 1 ORDER BY r.price, r.time_minutes DESC, r.id");
    }

    #[test]
    fn ordering_ends_on_a_unique_column_once() {
        let newest: Ordering<RecipeOrderField> = Ordering::parse(None, RECIPE_DEFAULT_ORDERING);
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1");
        newest.push_order_by(&mut query);
        assert_eq!(query.sql(), "SELECT 1 ORDER BY r.id DESC");

        let by_name: Ordering<AttributeOrderField> =
            Ordering::parse(None, ATTRIBUTE_DEFAULT_ORDERING);
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1");
        by_name.push_order_by(&mut query);
        assert_eq!(query.sql(), "SELECT 1 ORDER BY a.name DESC, a.id");

        let id_then_price: Ordering<RecipeOrderField> =
            Ordering::parse(Some("id,price"), RECIPE_DEFAULT_ORDERING);
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1");
        id_then_price.push_order_by(&mut query);
        assert_eq!(query.sql(), "SELECT 1 ORDER BY r.id, r.price");
    }

    #[test]
    fn search_splits_terms() {
        assert_eq!(
            search_terms(Some("  curry, thai\trice ")),
            vec!["curry", "thai", "rice"]
        );
        assert!(search_terms(None).is_empty());
        assert!(search_terms(Some(" , ")).is_empty());
    }

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn recipe_conditions_use_exists_subqueries() {
        let filter = RecipeFilter::from_query(
            &params(&[("tags", "1,2"), ("ingredients", "3"), ("search", "soup")]),
            10,
        )
        .unwrap();

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.id FROM recipes r WHERE r.user_id = ");
        query.push_bind(1);
        filter.push_conditions(&mut query);
        let sql = query.sql();

        assert!(sql.contains(
            "EXISTS (SELECT 1 FROM recipe_tags l WHERE l.recipe_id = r.id AND l.tag_id = ANY($2))"
        ));
        assert!(sql.contains(
            "EXISTS (SELECT 1 FROM recipe_ingredients l WHERE l.recipe_id = r.id AND l.ingredient_id = ANY($3))"
        ));
        assert!(sql.contains("r.title ILIKE $4 OR r.description ILIKE $5"));
        assert!(sql.contains("INNER JOIN tags a ON a.id = l.tag_id"));
        assert!(sql.contains("INNER JOIN ingredients a ON a.id = l.ingredient_id"));
        assert!(sql.ends_with("a.name ILIKE $7))"));
    }

    #[test]
    fn assigned_only_parses_integers() {
        let filter =
            AttributeFilter::from_query(&params(&[("assigned_only", "1")]), 10).unwrap();
        assert!(filter.assigned_only);

        let filter =
            AttributeFilter::from_query(&params(&[("assigned_only", "0")]), 10).unwrap();
        assert!(!filter.assigned_only);

        let errors = errors_of(AttributeFilter::from_query(
            &params(&[("assigned_only", "yes")]),
            10,
        ));
        assert!(errors.contains("assigned_only"));
    }

    #[test]
    fn attribute_conditions() {
        let filter = AttributeFilter::from_query(
            &params(&[("assigned_only", "1"), ("search", "bas"), ("ordering", "id")]),
            10,
        )
        .unwrap();
        assert_eq!(filter.ordering.fields, vec![(AttributeOrderField::Id, false)]);

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT a.id FROM ingredients a WHERE a.user_id = ");
        query.push_bind(1);
        filter.push_conditions(AttributeKind::Ingredient, &mut query);

        assert_eq!(
            query.sql(),
            "SELECT a.id FROM ingredients a WHERE a.user_id = $1 AND EXISTS (SELECT 1 FROM recipe_ingredients l WHERE l.ingredient_id = a.id) AND a.name ILIKE $2"
        );
    }

    #[test]
    fn attribute_ordering_defaults_to_name_descending() {
        let filter = AttributeFilter::from_query(&params(&[]), 10).unwrap();
        assert_eq!(filter.ordering.fields, vec![(AttributeOrderField::Name, true)]);
    }
}
