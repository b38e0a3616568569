/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use blockbuster_api::{app::{build_router, AppState}, config::Config};
/// use blockbuster_shared::{db::pool::create_pool, repository::Repositories};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.clone()).await?;
/// let state = AppState::new(Repositories::postgres(pool), config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use blockbuster_shared::{repository::Repositories, service::Services};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Domain services
    pub services: Services,

    /// Database pool, absent when running on the in-memory store
    pub pool: Option<PgPool>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repos: Repositories, config: Config) -> Self {
        Self {
            services: Services::new(&repos),
            pool: repos.pool,
            config: Arc::new(config),
        }
    }

    /// State backed by a fresh in-memory store
    pub fn in_memory(config: Config) -> Self {
        Self::new(Repositories::in_memory(), config)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health
/// ├── GET  /stats
/// ├── /movies            GET, POST
/// │   └── /:id           GET, PUT, DELETE
/// ├── /users             GET, POST
/// │   └── /:id           GET, PUT, DELETE
/// └── /loans             GET, POST
///     ├── /:id           GET
///     ├── /:id/return    POST, PUT
///     └── /users/:user_id GET
/// ```
///
/// Middleware, outermost first: CORS, request tracing, request timeout.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let movie_routes = Router::new()
        .route(
            "/",
            get(routes::movies::list_movies).post(routes::movies::create_movie),
        )
        .route(
            "/:id",
            get(routes::movies::get_movie)
                .put(routes::movies::update_movie)
                .delete(routes::movies::delete_movie),
        );

    let user_routes = Router::new()
        .route(
            "/",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        );

    let loan_routes = Router::new()
        .route(
            "/",
            get(routes::loans::list_loans).post(routes::loans::create_loan),
        )
        .route("/:id", get(routes::loans::get_loan))
        .route(
            "/:id/return",
            post(routes::loans::return_movie).put(routes::loans::return_movie),
        )
        .route("/users/:user_id", get(routes::loans::get_user_loans));

    let cors = cors_layer(&state.config.api.cors_origins);
    let timeout = Duration::from_secs(state.config.api.request_timeout_seconds);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/stats", get(routes::dashboard::stats))
        .nest("/movies", movie_routes)
        .nest("/users", user_routes)
        .nest("/loans", loan_routes)
        .layer(TimeoutLayer::new(timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
