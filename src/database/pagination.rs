use std::collections::HashMap;

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};

use super::error::FieldErrors;
use crate::constants::MAX_PAGE_SIZE;

/// The `limit`/`offset` window requested by a list call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset: offset.max(0),
        }
    }

    pub fn from_query(
        params: &HashMap<String, String>,
        default_limit: i64,
        errors: &mut FieldErrors,
    ) -> Self {
        let limit = parse_window(params, "limit", default_limit, 1, errors);
        let offset = parse_window(params, "offset", 0, 0, errors);

        Self::new(limit, offset)
    }

    pub fn push_limit(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" LIMIT ");
        query.push_bind(self.limit);
        query.push(" OFFSET ");
        query.push_bind(self.offset);
    }
}

fn parse_window(
    params: &HashMap<String, String>,
    key: &str,
    default: i64,
    min: i64,
    errors: &mut FieldErrors,
) -> i64 {
    match params.get(key).map(|value| value.trim()) {
        None | Some("") => default,
        Some(value) => match value.parse::<i64>() {
            Ok(n) if n >= min => n,
            Ok(_) => {
                errors.add(
                    key,
                    &format!("Ensure this value is greater than or equal to {min}."),
                );
                default
            }
            Err(_) => {
                errors.add(key, "A valid integer is required.");
                default
            }
        },
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PageContext<T> {
    pub count: i64,
    pub next_offset: Option<i64>,
    pub prev_offset: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(results: Vec<T>, count: i64, page: Page) -> Self {
        let end = page.offset + results.len() as i64;
        let next_offset = (end < count).then_some(end);
        let prev_offset = (page.offset > 0).then(|| (page.offset - page.limit).max(0));

        Self {
            count,
            next_offset,
            prev_offset,
            results,
        }
    }
}
