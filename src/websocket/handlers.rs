use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::state::AppState;
use crate::websocket::RoomSession;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub room_id: Uuid,
    pub token: Option<String>,
}

fn bearer_token(params: &WsParams, headers: &HeaderMap) -> Option<String> {
    params.token.clone().or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// Upgrades `GET /api/v1/ws?room_id=...&token=...` to a room session.
/// An unauthenticated principal is rejected before the upgrade, so the
/// client observes the connection closing without a reply.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = bearer_token(&params, &headers) else {
        warn!("websocket rejected: no token provided");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let user = match state.auth.authenticate(&token).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "websocket rejected: authentication failed");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| run_session(state, user, params.room_id, socket))
}

/// Pumps one socket for the lifetime of its session. Every exit path — a
/// clean close, a transport error, or the peer vanishing — falls through to
/// `disconnect`, so cleanup runs exactly once per connection.
async fn run_session(state: AppState, user: AuthUser, room_id: Uuid, mut socket: WebSocket) {
    let username = user.username.clone();
    let (session, mut rx) = match RoomSession::connect(&state, user, room_id).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, %room_id, username, "websocket join rejected");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(frame) => {
                    if sink.send(frame).await.is_err() {
                        break;
                    }
                }
                None => break,
            },

            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => session.handle_text(&text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                // Ping/pong is answered by the framework.
                Some(Ok(_)) => {}
            },
        }
    }

    session.disconnect().await;
}
