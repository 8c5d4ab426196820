mod database {
    pub mod actions;
    pub mod connection;
    pub mod error;
    pub mod filters;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
}
mod api {
    mod attributes;
    mod recipes;
    pub mod routes;
    mod users;
}
pub mod config;
mod constants;
pub mod media;

pub use api::routes::{handle_rejection, routes, with_context, Context};
pub use authentication::*;
pub use constants::*;
pub use database::*;
