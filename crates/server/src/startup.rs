use std::{future::Future, path::PathBuf, sync::Arc};

use common::env::{ensure_dir, program_root, resolve_under, DirStatus};
use configs::AppConfig;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::{errors::StartupError, mail::MailIdentity, routes};

/// Everything resolved during startup, shared with request handlers.
#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    /// Absolute path of the provisioned images directory.
    pub images_dir: PathBuf,
    pub images_status: DirStatus,
    pub mail: MailIdentity,
}

/// Load `config.toml` (or `CONFIG_PATH`), then apply environment overrides.
pub fn load_config() -> Result<AppConfig, StartupError> {
    Ok(AppConfig::load_and_validate()?)
}

/// A relative `storage.root` is taken from the executable's directory too.
fn anchor_root(config: &AppConfig) -> Result<PathBuf, StartupError> {
    match &config.storage.root {
        Some(root) if root.is_absolute() => Ok(root.clone()),
        Some(root) => Ok(program_root().map_err(StartupError::ProgramRoot)?.join(root)),
        None => program_root().map_err(StartupError::ProgramRoot),
    }
}

/// Provision the filesystem and resolve collaborators. Must succeed before
/// any listener is bound.
pub async fn initialize(config: AppConfig) -> Result<AppContext, StartupError> {
    let root = anchor_root(&config)?;
    let images_dir = resolve_under(&root, &config.storage.images_dir);

    let images_status = ensure_dir(&images_dir).await?;
    info!(
        event = "provisioned",
        path = %images_dir.display(),
        created = images_status == DirStatus::Created,
        "images directory ready"
    );

    let mail = MailIdentity::from_config(&config.mail)?;
    let (relay, port) = mail.relay();
    info!(
        event = "mail_identity",
        sender = %mail.sender(),
        relay,
        port,
        "outbound mail identity configured"
    );

    Ok(AppContext { config, images_dir, images_status, mail })
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    ctx: Arc<AppContext>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = routes::build_router(ctx, CorsLayer::very_permissive());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(StartupError::Serve)
}

/// Public entry: initialize, bind, and run the HTTP server until Ctrl+C.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    let ctx = Arc::new(initialize(config).await?);

    let addr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.clone(), source })?;
    info!(event = "listening", %addr, "server listening");

    serve(ctx, listener, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot install Ctrl+C handler; running until killed");
        std::future::pending::<()>().await;
    }
    info!(event = "shutdown_signal", "received Ctrl+C, shutting down");
}
