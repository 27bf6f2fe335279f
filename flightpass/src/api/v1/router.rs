use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;
use super::middleware::v1_auth_middleware;

pub fn v1_router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/flights/image/{fileName}",
            get(handlers::flights::get_boarding_pass_image),
        );

    let protected_routes = Router::new()
        .route(
            "/boarding-passes:decode",
            post(handlers::boarding_passes::decode_boarding_pass),
        )
        .route(
            "/flights/{flightNumber}/boarding-pass",
            post(handlers::flights::upload_boarding_pass),
        )
        .route_layer(middleware::from_fn_with_state(state, v1_auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
