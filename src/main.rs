//! koushi-server 入口
//! 初始化日志与共享状态，挂载路由并启动 HTTP 服务

mod errors;
mod handlers;
mod models;
mod services;

use anyhow::Result;
use handlers::AppState;
use services::{OllamaClient, OllamaConfig, QuizService, SessionStore};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger()?;

    let config = OllamaConfig::from_env();
    log::info!(
        "Using Ollama backend at {} (model: {})",
        config.url,
        config.model
    );

    let state = AppState {
        quiz: QuizService::new(OllamaClient::new(config)),
        store: SessionStore::new(),
    };

    let app = handlers::routes(state).layer(CorsLayer::permissive());

    let addr = std::env::var("KOUSHI_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_logger() -> Result<()> {
    let level = match std::env::var("RUST_LOG").as_deref() {
        Ok("debug") => log::LevelFilter::Debug,
        Ok("warn") => log::LevelFilter::Warn,
        Ok("error") => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
