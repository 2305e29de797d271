pub mod auth;
pub mod catalog;
pub mod clock;
pub mod codegen;
pub mod commission;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hierarchy;
pub mod integrity;
pub mod keys;
pub mod login_limiter;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod sales;
pub mod salespeople;
pub mod util;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::AppState;

/// The full HTTP surface: public, `/admin` and `/me` routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::router())
        .merge(handlers::admin::router(state.clone()))
        .merge(handlers::salesperson::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
