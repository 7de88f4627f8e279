use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Machine-readable `type` member of a problem body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    CupcakeNotFound,
    InvalidPayload,
    FieldTooLong,
    StorageError,
    TemplateError,
}

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: ProblemType,
    title: &'static str,
    detail: String,
}

/// `application/problem+json` error body.
#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: ProblemType, detail: S) -> Self {
        let title = status.canonical_reason().unwrap_or("error");
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title,
                detail: detail.into(),
            },
        }
    }

    pub fn not_found<S: Into<String>>(detail: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, ProblemType::CupcakeNotFound, detail)
    }

    pub fn storage<S: Into<String>>(detail: S) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ProblemType::StorageError,
            detail,
        )
    }

    pub fn template<S: Into<String>>(detail: S) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ProblemType::TemplateError,
            detail,
        )
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let status = self.status;
        let mut response = (status, Json(self.body)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
