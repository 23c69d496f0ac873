use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};

use carelink_index::IndexError;
use carelink_types::api::{Claims, MarkReadResponse, SendMessageRequest, UnreadCountResponse};
use carelink_types::events::GatewayEvent;

use crate::state::AppState;

/// POST /conversations/{partner_id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let sender = claims.sub.clone();
    let receiver = partner_id.clone();
    let message = run_blocking(move || db.index.send(&sender, &receiver, &req.content)).await?;

    // Notification failure never undoes the send
    state
        .dispatcher
        .send_to_user(
            &partner_id,
            GatewayEvent::MessageCreate {
                message: message.clone(),
                sender_role: claims.role,
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /conversations/{partner_id}/messages
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messages =
        run_blocking(move || state.index.transcript(&claims.sub, &partner_id)).await?;
    Ok(Json(messages))
}

/// POST /conversations/{partner_id}/read — marks what the partner sent to the caller.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let sender = partner_id.clone();
    let reader = claims.sub.clone();
    let updated = run_blocking(move || db.index.mark_read(&sender, &reader)).await?;

    if updated > 0 {
        state
            .dispatcher
            .send_to_user(
                &partner_id,
                GatewayEvent::MessagesRead {
                    reader_id: claims.sub,
                    count: updated,
                },
            )
            .await;
    }

    Ok(Json(MarkReadResponse { updated }))
}

/// GET /inbox
pub async fn get_inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let inbox = run_blocking(move || state.index.inbox(&claims.sub)).await?;
    Ok(Json(inbox))
}

/// GET /unread
pub async fn get_unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let unread_count = run_blocking(move || state.index.unread_count(&claims.sub)).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

/// Run a blocking index call off the async runtime.
async fn run_blocking<F, T>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> Result<T, IndexError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| status_for(&e))
}

fn status_for(err: &IndexError) -> StatusCode {
    match err {
        IndexError::InvalidInput(reason) => {
            warn!("Bad request: {}", reason);
            StatusCode::BAD_REQUEST
        }
        IndexError::StorageUnavailable(source) => {
            error!("Storage error: {:#}", source);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
