use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// One failed field check, shaped like the `errors[]` entries clients expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub msg: String,
    pub path: String,
    pub location: &'static str,
}

impl FieldError {
    pub fn body(path: &str, msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            path: path.to_string(),
            location: "body",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    InvalidInput {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("User already exists")]
    DuplicateIdentity,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

/// Internal error text stashed on a 500 response; `app::error_details`
/// decides whether it reaches the client.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl ApiError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        ApiError::InvalidInput {
            message: "Validation failed".into(),
            errors,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput { .. }
            | ApiError::DuplicateIdentity
            | ApiError::InvalidCredentials
            | ApiError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::InvalidInput { message, errors } if !errors.is_empty() => {
                (status, Json(json!({ "message": message, "errors": errors }))).into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                let mut res =
                    (status, Json(json!({ "message": "Server error" }))).into_response();
                res.extensions_mut().insert(ErrorDetail(format!("{e:#}")));
                res
            }
            other => (status, Json(json!({ "message": other.to_string() }))).into_response(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput {
            message: format!("Invalid JSON body: {}", rejection.body_text()),
            errors: Vec::new(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidInput {
            message: format!("Invalid query string: {}", rejection.body_text()),
            errors: Vec::new(),
        }
    }
}

/// `Json` extractor whose rejection uses the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// `Query` counterpart of [`AppJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::validation(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::DuplicateIdentity.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::InvalidState("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_errors_carry_field_list() {
        let res = ApiError::validation(vec![FieldError::body("email", "Valid email is required")])
            .into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0]["msg"], "Valid email is required");
        assert_eq!(body["errors"][0]["path"], "email");
        assert_eq!(body["errors"][0]["location"], "body");
    }

    #[tokio::test]
    async fn internal_error_hides_detail_in_body() {
        let res = ApiError::Internal(anyhow::anyhow!("connection reset")).into_response();
        assert_eq!(
            res.extensions().get::<ErrorDetail>().map(|d| d.0.as_str()),
            Some("connection reset")
        );
        let body = body_json(res).await;
        assert_eq!(body["message"], "Server error");
        assert!(body.get("error").is_none());
    }
}
