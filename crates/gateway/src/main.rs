use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use beto_domain::config::Config;
use beto_gateway::api;
use beto_gateway::bootstrap::{build_app_state, spawn_background_tasks};

/// beto — multi-agent conversational orchestration server.
#[derive(Parser, Debug)]
#[command(name = "beto", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Load and validate the config, print any issues, and exit.
    #[arg(long)]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load(&cli.config).context("loading config")?;

    if cli.validate_config {
        let issues = config.validate();
        for issue in &issues {
            println!("{issue}");
        }
        if issues.iter().any(|i| i.severity == beto_domain::config::ConfigSeverity::Error) {
            std::process::exit(1);
        }
        println!("config OK");
        return Ok(());
    }

    run_server(Arc::new(config)).await
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,beto_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("beto starting");

    let state = build_app_state(config.clone()).await?;
    spawn_background_tasks(&state);

    let cors_layer = build_cors_layer(&config.server.cors);

    let governor_layer = config.server.rate_limit.as_ref().map(|rl| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(rl.requests_per_second.into())
            .burst_size(rl.burst_size)
            .finish()
            .expect("rate_limit: requests_per_second and burst_size must be > 0");

        tracing::info!(
            requests_per_second = rl.requests_per_second,
            burst_size = rl.burst_size,
            "per-IP rate limiting enabled"
        );
        GovernorLayer { config: Arc::new(gov_config) }
    });
    if governor_layer.is_none() {
        tracing::info!("per-IP rate limiting disabled (no [server.rate_limit] in config)");
    }

    let router = api::router(state.clone()).layer(cors_layer);
    let app = if let Some(gov) = governor_layer {
        router.layer(gov).with_state(state.clone())
    } else {
        router.with_state(state.clone())
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "beto listening");
    axum::serve(listener, app).await.context("axum server error")?;
    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may contain a trailing `*` wildcard for the port segment
/// (e.g. `http://localhost:*`). A literal `"*"` allows all origins.
fn build_cors_layer(cors: &beto_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();
    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
