use portfolio_dashboard_server::{
    api::app_router, build_state, config::Config, init_tracing, scheduler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the subscriber reads RUST_LOG / PD_LOG_FORMAT.
    dotenvy::dotenv().ok();
    init_tracing();
    let config = Config::from_env()?;
    let state = build_state(&config)?;

    scheduler::start_portfolio_scheduler(state.clone(), config.settings.poll_interval);

    let router = app_router(state, &config);
    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
