//! Per-request error surface.
//!
//! Handlers return `Result<_, ApiError>`; failures become a JSON body with a
//! stable code and never escape the request that caused them.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

use apikit_core::error::{ApiKitError, ErrorCode};

#[derive(Debug)]
pub struct ApiError(pub ApiKitError);

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(ApiKitError::BadRequest(msg.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0.client_code() {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApiKitError> for ApiError {
    fn from(e: ApiKitError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        let body = json!({
            "code": self.0.client_code().as_str(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// `Json<T>` whose rejections surface as a 400 `ApiError`.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_status() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError(ApiKitError::NotFound("user".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError(ApiKitError::Internal("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
