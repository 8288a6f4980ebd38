use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, JsonBody};
use crate::service::{Routes, Service};

/// `POST /api/v1/echo` with `{"message": "..."}`; malformed bodies get a 400.
#[derive(Default)]
pub struct EchoService;

impl EchoService {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EchoMessage {
    pub message: String,
}

async fn echo(JsonBody(req): JsonBody<EchoMessage>) -> Result<Json<EchoMessage>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    Ok(Json(req))
}

impl Service for EchoService {
    fn name(&self) -> &str {
        "echo"
    }

    fn register_routes(&self, routes: &mut Routes) {
        routes.post("/api/v1/echo", echo);
    }
}
