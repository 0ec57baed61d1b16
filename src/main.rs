use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use api_shared::AccountService;
use leafdoc_core::{CoreConfig, PredictionService};
use leafdoc_files::UploadStore;

const DEFAULT_REST_ADDR: &str = "0.0.0.0:5000";

/// Replaces the port of `addr` when `port` is set, for hosts that only hand out `PORT`.
fn rest_addr_from_env_values(addr: Option<String>, port: Option<String>) -> anyhow::Result<String> {
    let addr = addr
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REST_ADDR.into());
    let Some(port) = port.filter(|p| !p.trim().is_empty()) else {
        return Ok(addr);
    };
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("PORT={port}: {e}"))?;
    let host = addr.rsplit_once(':').map_or(addr.as_str(), |(host, _)| host);
    Ok(format!("{host}:{port}"))
}

/// Main entry point for the LeafDoc service
///
/// Serves the REST API (with Swagger UI) and the uploaded images.
///
/// # Environment Variables
/// - `LEAFDOC_REST_ADDR`: Server address (default: "0.0.0.0:5000"); `PORT` overrides the port
/// - `LEAFDOC_*`: core settings, see `CoreConfig::from_env_lookup`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration values are invalid or the treatment table cannot be loaded,
/// - the upload directory cannot be created, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leafdoc=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("api_shared=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = rest_addr_from_env_values(
        std::env::var("LEAFDOC_REST_ADDR").ok(),
        std::env::var("PORT").ok(),
    )?;
    let cfg = CoreConfig::from_env_lookup(|name| std::env::var(name).ok())?;

    let predictions = PredictionService::from_config(&cfg)?;
    tracing::info!(
        "classifier: {}, explainer: {} ({:?} timeout)",
        predictions.classifier_name(),
        cfg.explainer().program,
        cfg.explainer().timeout
    );

    let uploads = UploadStore::new(cfg.upload_dir())?;
    tracing::info!("uploads stored in {}", uploads.upload_dir().display());

    let app = router(AppState {
        predictions,
        accounts: Arc::new(AccountService::new()),
        uploads: Arc::new(uploads),
    });

    tracing::info!("++ Starting LeafDoc REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_addr_defaults() {
        assert_eq!(rest_addr_from_env_values(None, None).unwrap(), "0.0.0.0:5000");
    }

    #[test]
    fn port_overrides_configured_port() {
        assert_eq!(
            rest_addr_from_env_values(Some("127.0.0.1:8080".into()), Some("9000".into())).unwrap(),
            "127.0.0.1:9000"
        );
        assert_eq!(
            rest_addr_from_env_values(None, Some("7000".into())).unwrap(),
            "0.0.0.0:7000"
        );
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(rest_addr_from_env_values(None, Some("http".into())).is_err());
    }
}
