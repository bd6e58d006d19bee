use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use ulr_core::{
    CoreConfig,
    constants::{DEFAULT_CARE_LOCATION, DEFAULT_DATA_DIR, DEFAULT_NAMESPACE},
};

/// Main entry point for the ULR server
///
/// Serves the clinical attention REST API with Swagger UI at `/swagger-ui`.
///
/// # Environment Variables
/// - `ULR_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `ULR_DATA_DIR`: Directory holding the attention store (default: "attention_data"); must exist
/// - `ULR_CARE_LOCATION`: Care location recorded on every commit (default: "Servicio de Urgencia")
/// - `ULR_NAMESPACE`: Namespace for commit author emails (default: "ulr.dev.1")
///
/// # Errors
/// Returns an error if configuration is invalid, the address cannot be bound, or the server
/// fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ulr=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("ulr_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("ULR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let data_dir = std::env::var("ULR_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let data_path = Path::new(&data_dir);
    if !data_path.exists() {
        anyhow::bail!("Data directory does not exist: {}", data_path.display());
    }

    let care_location =
        std::env::var("ULR_CARE_LOCATION").unwrap_or_else(|_| DEFAULT_CARE_LOCATION.into());
    let namespace = std::env::var("ULR_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.into());

    let cfg = Arc::new(CoreConfig::new(
        data_path.to_path_buf(),
        care_location,
        namespace,
    )?);

    let app = router(AppState::new(cfg));

    tracing::info!("-- Starting ULR REST API on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
