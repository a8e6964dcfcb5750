use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{ride, rider};
use crate::middleware::auth::auth_middleware;
use crate::middleware::rate_limit::create_rider_governor;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Rider routes (requires auth)
    // Rate limit: 100 requests per minute per rider
    let rider_routes = Router::new()
        .route("/book-ride", post(ride::book_ride))
        .route("/riders/me", get(rider::me))
        .route("/riders/me/salary", put(rider::update_salary))
        .layer(create_rider_governor())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(rider_routes).with_state(state)
}
