#![allow(dead_code)]

use std::{collections::HashMap, path::Path, time::Duration};

use recipe_api::{config::Config, schema::User, Context};
use sqlx::postgres::PgPoolOptions;
use bytes::Bytes;
use warp::http::Response;

pub const SECRET: &str = "integration-test-secret";

pub fn test_config(database_url: &str, media_root: &Path) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("DATABASE_URL", database_url.to_string()),
        ("SECRET_KEY", SECRET.to_string()),
        ("MEDIA_ROOT", media_root.display().to_string()),
    ]);
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

/// A context whose pool never connects successfully.
pub fn offline_context(media_root: &Path) -> Context {
    let config = test_config("postgres://nobody@127.0.0.1:1/nothing", media_root);
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    Context::new(pool, config).expect("context")
}

pub fn token_for(ctx: &Context, id: i32) -> String {
    let user = User {
        id,
        email: format!("user{id}@example.com"),
        name: String::from("Test"),
        password: String::new(),
        is_active: true,
        is_staff: false,
    };
    ctx.session_key.generate_session(&user).expect("token")
}

pub fn json_body(response: &Response<Bytes>) -> serde_json::Value {
    serde_json::from_slice(response.body()).expect("json body")
}

/// A `multipart/form-data` body carrying one file part.
pub fn multipart_body(boundary: &str, field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
