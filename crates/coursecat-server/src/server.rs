use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use coursecat_storage::DynCourseStore;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::AdminAuth;
use crate::cache::{DynCacheGateway, create_cache_gateway};
use crate::config::{AppConfig, ImportConfig};
use crate::recommendations::Recommender;
use crate::service::CourseService;
use crate::{handlers, middleware as app_middleware};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CourseService>,
    pub auth: Arc<AdminAuth>,
    pub recommender: Arc<Recommender>,
    pub import: ImportConfig,
}

impl AppState {
    /// Wires the service and its collaborators around an existing store and cache.
    pub fn new(
        cfg: &AppConfig,
        store: DynCourseStore,
        cache: DynCacheGateway,
    ) -> anyhow::Result<Self> {
        let auth = AdminAuth::from_config(&cfg.auth).context("invalid auth configuration")?;
        let recommender = Recommender::new(&cfg.recommendations, store.clone())
            .context("failed to build recommendations client")?;
        let service = CourseService::with_ttls(store, cache, cfg.cache.ttls());

        Ok(Self {
            service: Arc::new(service),
            auth: Arc::new(auth),
            recommender: Arc::new(recommender),
            import: cfg.import.clone(),
        })
    }
}

pub struct CoursecatServer {
    addr: SocketAddr,
    app: Router,
}

/// Creates the configured store and cache and assembles the state.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let store: DynCourseStore = if cfg.storage.is_memory() {
        tracing::info!("using in-memory course storage");
        coursecat_db_memory::create_course_store()
    } else {
        let pg = cfg
            .storage
            .postgres
            .to_postgres_config()
            .context("storage.postgres.url is required for the postgres backend")?;
        tracing::info!(
            url = %coursecat_db_postgres::mask_password(&pg.url),
            "connecting to PostgreSQL"
        );
        coursecat_db_postgres::create_course_store(pg)
            .await
            .context("failed to initialize PostgreSQL storage")?
    };
    let cache = create_cache_gateway(&cfg.redis);
    AppState::new(cfg, store, cache)
}

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    crate::metrics::init_metrics();
    let admin = middleware::from_fn_with_state(state.clone(), app_middleware::require_admin);

    Router::new()
        // Health and observability endpoints
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        // Admin authentication
        .route("/api/auth/login", post(handlers::login))
        .route(
            "/api/auth/me",
            get(handlers::me).route_layer(admin.clone()),
        )
        // Catalog
        .route(
            "/api/courses",
            get(handlers::list_courses)
                .merge(post(handlers::create_course).route_layer(admin.clone())),
        )
        .route("/api/courses/search", get(handlers::search_courses))
        .route("/api/courses/stats", get(handlers::course_stats))
        .route(
            "/api/courses/bulk",
            post(handlers::bulk_insert).route_layer(admin.clone()),
        )
        .route(
            "/api/courses/import",
            post(handlers::import_csv).route_layer(admin.clone()),
        )
        .route(
            "/api/courses/{course_id}",
            get(handlers::get_course).merge(
                put(handlers::update_course)
                    .patch(handlers::update_course)
                    .delete(handlers::delete_course)
                    .route_layer(admin),
            ),
        )
        .route("/api/recommendations", post(handlers::recommend))
        .route_layer(middleware::from_fn(app_middleware::track_metrics))
        .with_state(state)
        // Innermost first: cors, compression, trace, request id, body limit
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<app_middleware::RequestId>()
                        .map(|id| id.as_str().to_string())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = build_state(cfg).await?;
    Ok(build_router(state, cfg.server.body_limit_bytes))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<CoursecatServer> {
        let app = build_app(&self.config).await?;
        Ok(CoursecatServer {
            addr: self.addr,
            app,
        })
    }
}

impl CoursecatServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
