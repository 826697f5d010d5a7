use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

/// HTTP-facing error taxonomy. 401s live in `common-auth`; everything a
/// handler reports once a credential has been established goes through here.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: Option<String> },
    Forbidden { required: Option<String> },
    NotFound { code: &'static str, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest { code, message: Some(message.into()) }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound { code, message: Some(message.into()) }
    }

    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal { trace_id: Some(Uuid::new_v4()), message: Some(e.to_string()) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, error_code) = match self {
            ApiError::BadRequest { code, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { code: code.into(), required: None, trace_id: None, message },
                code,
            ),
            ApiError::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "forbidden".into(),
                    required,
                    trace_id: None,
                    message: Some("unauthorized".into()),
                },
                "forbidden",
            ),
            ApiError::NotFound { code, message } => (
                StatusCode::NOT_FOUND,
                ErrorBody { code: code.into(), required: None, trace_id: None, message },
                code,
            ),
            ApiError::Internal { trace_id, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { code: "internal_error".into(), required: None, trace_id, message },
                "internal_error",
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
