use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;
use crate::websocket::handlers::ws_handler;

pub mod messages;
pub mod rooms;

pub fn build_router(state: AppState) -> Router {
    // The websocket route authenticates itself from the query token, so it
    // sits outside the bearer-header middleware.
    let api_v1 = Router::new()
        .route("/rooms/direct", post(rooms::open_direct_room))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/:id/messages", get(messages::get_message_history))
        .route("/rooms/:id/presence", get(rooms::get_room_presence))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::auth_middleware,
        ))
        .route("/ws", get(ws_handler));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api/v1", api_v1)
        .with_state(state)
}
