//! OpenClass learning platform server.
//!
//! Serves the REST API over a PostgreSQL store in production, or an
//! in-memory store for local development when `DATABASE_URL` is unset.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use pico_args::Arguments;

use oc_server::api::{self, AppState, StorageKind};
use oc_server::config::ServerConfig;
use oc_server::{logging, metrics};
use open_class::auth::{AuthManager, TokenCodec};
use open_class::db::{
    ContentRepository, Database, MemoryContentRepository, MemoryUserRepository,
    PgContentRepository, PgUserRepository, UserRepository,
};
use open_class::lms::LmsManager;
use open_class::seed;

const HELP: &str = "\
Run the OpenClass learning platform server

USAGE:
  oc_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env BIND_ADDR or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  APP_ENV                  development | production  [default: development]
  BIND_ADDR                Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string; unset in development selects the in-memory store
  ACCESS_TOKEN_SECRET      Access token signing secret (min 32 chars)
  REFRESH_TOKEN_SECRET     Refresh token signing secret (min 32 chars, must differ)
  PASSWORD_PEPPER          Password hashing pepper (min 16 chars)
  ACCESS_TOKEN_TTL_SECS    Access token lifetime  [default: 900]
  REFRESH_TOKEN_TTL_SECS   Refresh token lifetime  [default: 2592000]
  ADMIN_EMAIL              Startup admin account  [default: admin@openclass.local]
  ADMIN_PASSWORD           Startup admin password  [default: admin123 in development]
  SEED_DEMO                Seed demo users and tracks  [default: true outside production]
  APP_ORIGIN               Exact frontend origin allowed for CORS
  METRICS_BIND             Prometheus exporter address (e.g., 127.0.0.1:9000)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;

    tracing::info!(
        env = config.env.as_str(),
        "Starting OpenClass server at {}",
        config.bind
    );

    let (users, content, storage): (
        Arc<dyn UserRepository>,
        Arc<dyn ContentRepository>,
        StorageKind,
    ) = match &config.database {
        Some(db_config) => {
            tracing::info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            db.ensure_schema()
                .await
                .context("Failed to apply database schema")?;
            tracing::info!("Database connected successfully");

            let pool = db.pool().clone();
            (
                Arc::new(PgUserRepository::new(pool.clone())),
                Arc::new(PgContentRepository::new(pool)),
                StorageKind::Postgres,
            )
        }
        None => {
            tracing::warn!(
                "DATABASE_URL is not set, using the in-memory store (data is lost on restart)"
            );
            (
                Arc::new(MemoryUserRepository::new()),
                Arc::new(MemoryContentRepository::new()),
                StorageKind::Memory,
            )
        }
    };

    let codec = TokenCodec::new(
        config.security.access_token_secret.clone(),
        config.security.refresh_token_secret.clone(),
        config.tokens.access_ttl_secs,
        config.tokens.refresh_ttl_secs,
    );
    let auth = Arc::new(AuthManager::new(
        users.clone(),
        codec,
        config.security.password_pepper.clone(),
    ));
    let lms = Arc::new(LmsManager::new(content.clone(), users.clone()));

    seed::ensure_admin(&auth, &config.admin.email, &config.admin.password)
        .await
        .context("Failed to ensure admin account")?;
    if config.seed_demo {
        seed::seed_demo(&auth, content.as_ref())
            .await
            .context("Failed to seed demo data")?;
    }

    if let Some(addr) = config.metrics_bind {
        match metrics::init_metrics(addr) {
            Ok(()) => tracing::info!("Metrics exporter listening on {addr}"),
            Err(e) => tracing::warn!("Metrics exporter disabled: {e}"),
        }
    }

    let bind = config.bind;
    let state = AppState {
        auth,
        lms,
        users,
        config: Arc::new(config),
        storage,
    };

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {bind}"))?;

    tracing::info!("Server is running at http://{bind}. Press Ctrl+C to stop.");

    // ConnectInfo feeds the per-IP rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Shutting down server");

    Ok(())
}

/// Resolves when the process receives Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        _ = terminate => {},
    }
}
