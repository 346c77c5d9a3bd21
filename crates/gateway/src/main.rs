//! Scholarpress API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication (bearer tokens from the identity provider)
//! - Rate limiting
//! - Request routing to the catalogue and review workflow
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Request},
    middleware::{self as axum_middleware, Next},
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use scholarpress_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{DbPool, Repository},
    errors::AppError,
    metrics,
    storage::HttpBlobStore,
    PublicationService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub publications: Arc<PublicationService<Repository>>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config);
    info!("Starting Scholarpress API Gateway v{}", scholarpress_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .install()?;
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }
    let repo = Repository::new(db);

    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret is required".to_string(),
        })?;
    let jwt = Arc::new(JwtManager::new(
        secret,
        config.auth.jwt_expiration_secs,
        config.auth.jwt_audience.as_deref(),
    ));

    let blobs = Arc::new(HttpBlobStore::new(&config.storage)?);
    let publications = Arc::new(
        PublicationService::new(repo.clone(), config.submission.mode)
            .with_blob_store(blobs, config.storage.max_upload_bytes),
    );

    // Create app state
    let state = AppState {
        config: config.clone(),
        repo,
        jwt,
        publications,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.observability.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Public catalogue and author routes
    let publication_routes = Router::new()
        .route("/site-config", get(handlers::site::site_config))
        .route(
            "/publications",
            get(handlers::publications::list_publications)
                .post(handlers::publications::create_publication),
        )
        .route("/publications/search", get(handlers::publications::search_publications))
        .route(
            "/publications/{id}",
            get(handlers::publications::get_publication)
                .put(handlers::publications::update_publication),
        )
        .route(
            "/publications/{id}/file",
            put(handlers::publications::upload_file)
                .layer(DefaultBodyLimit::max(config.storage.max_upload_bytes)),
        )
        .route("/me/publications", get(handlers::publications::my_publications))
        .route(
            "/me/profile",
            get(handlers::profile::get_profile).put(handlers::profile::update_profile),
        );

    // Editorial routes
    let admin_routes = Router::new()
        .route("/queue", get(handlers::admin::queue))
        .route("/stats", get(handlers::admin::stats))
        .route("/retained", get(handlers::admin::retained))
        .route("/reviews", get(handlers::admin::audit_log))
        .route("/publications/{id}/review", post(handlers::admin::review))
        .route("/publications/{id}/retain", post(handlers::admin::retain))
        .route("/publications/{id}/republish", post(handlers::admin::republish));

    let mut api_routes = Router::new()
        .merge(publication_routes)
        .nest("/admin", admin_routes);

    if config.rate_limit.enabled {
        let per_second = config.rate_limit.requests_per_second;
        let limiter =
            middleware::rate_limit::create_rate_limiter(per_second, config.rate_limit.burst);
        api_routes = api_routes.layer(axum_middleware::from_fn(move |req: Request, next: Next| {
            middleware::rate_limit::rate_limit_middleware(req, next, limiter.clone(), per_second)
        }));
    }

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(middleware::request_metrics))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_secs,
                )))
                .layer(cors)
                .layer(request_id)
                .layer(propagate_id),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
