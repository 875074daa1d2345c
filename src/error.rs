use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::RoomType;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("malformed instance: {0}")]
    MalformedInstance(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("no eligible lecturer for subject {subject} of batch {batch}")]
    NoEligibleLecturer { batch: String, subject: String },

    #[error("no {room_type:?} room available for batch {batch}")]
    RoomUnavailable { batch: String, room_type: RoomType },

    #[error("session {session} still collides after every repair strategy")]
    RepairExhausted { session: u32 },
}

impl IntoResponse for ScheduleError {
    fn into_response(self) -> Response {
        let status = match self {
            ScheduleError::MalformedInstance(_) | ScheduleError::InvalidParameters(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
