use anyhow::Context as _;
use recipe_api::{
    config::Config,
    connection::{connect_pool, run_migrations},
    routes, Context,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().context("load configuration")?;
    let bind_addr = config.bind_addr;

    let pool = connect_pool(&config).await?;
    run_migrations(&pool).await?;

    tokio::fs::create_dir_all(&config.media_root)
        .await
        .with_context(|| format!("create media root {}", config.media_root.display()))?;

    let ctx = Context::new(pool, config).context("build session key")?;

    tracing::info!("Listening on {bind_addr}");
    warp::serve(routes(ctx)).run(bind_addr).await;

    Ok(())
}
