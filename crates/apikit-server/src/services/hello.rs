use axum::Json;
use serde_json::{json, Value};

use crate::service::{Routes, Service};

/// `GET /api/v1/` -> `{"message":"Hello World!"}`.
#[derive(Default)]
pub struct HelloService;

impl HelloService {
    pub fn new() -> Self {
        Self
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World!" }))
}

impl Service for HelloService {
    fn name(&self) -> &str {
        "hello"
    }

    fn register_routes(&self, routes: &mut Routes) {
        routes.get("/api/v1/", root);
    }
}
