use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use cupcakes_core::{Cupcake, CupcakePayload, PayloadError};
use cupcakes_storage::CupcakeError;

use crate::problem::{ProblemResponse, ProblemType};
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct CupcakeList {
    cupcakes: Vec<Cupcake>,
}

#[derive(Debug, Serialize)]
pub struct CupcakeBody {
    cupcake: Cupcake,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    message: &'static str,
}

/// Failures surfaced by the JSON endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cupcake {0} not found")]
    NotFound(i64),
    #[error("cupcake id must be an integer")]
    InvalidId,
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("invalid request body: {detail}")]
    InvalidBody { status: StatusCode, detail: String },
    #[error("storage failure: {0}")]
    Storage(CupcakeError),
}

impl ApiError {
    fn metric_label(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::InvalidId => "not_found",
            Self::Payload(_) | Self::InvalidBody { .. } => "bad_request",
            Self::Storage(_) => "error",
        }
    }
}

impl From<CupcakeError> for ApiError {
    fn from(err: CupcakeError) -> Self {
        match err {
            CupcakeError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::MissingJsonContentType(_) => rejection.status(),
            _ => StatusCode::BAD_REQUEST,
        };
        Self::InvalidBody {
            status,
            detail: rejection.body_text(),
        }
    }
}

// Path segments that are not integers never name a cupcake.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::InvalidId
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(id) => {
                ProblemResponse::not_found(format!("no cupcake with id {id}")).into_response()
            }
            Self::InvalidId => {
                ProblemResponse::not_found("cupcake id must be an integer").into_response()
            }
            Self::Payload(err @ PayloadError::MissingFields(_)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
            Self::Payload(err) => ProblemResponse::new(
                StatusCode::BAD_REQUEST,
                ProblemType::FieldTooLong,
                err.to_string(),
            )
            .into_response(),
            Self::InvalidBody { status, detail } => {
                ProblemResponse::new(status, ProblemType::InvalidPayload, detail).into_response()
            }
            Self::Storage(err) => {
                error!(stage = "api", error = %err, "cupcake storage operation failed");
                ProblemResponse::storage("failed to access cupcake storage").into_response()
            }
        }
    }
}

fn observe<T>(op: &'static str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    let label = match &result {
        Ok(_) => "ok",
        Err(err) => err.metric_label(),
    };
    counter!("api_cupcake_requests_total", "op" => op, "result" => label).increment(1);
    result
}

/// `GET /api/cupcakes`
pub async fn list(State(state): State<AppState>) -> Result<Json<CupcakeList>, ApiError> {
    let result = async {
        let cupcakes = state.cupcakes().list_all().await?;
        Ok::<_, ApiError>(Json(CupcakeList { cupcakes }))
    }
    .await;
    observe("list", result)
}

/// `GET /api/cupcakes/:id`
pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<CupcakeBody>, ApiError> {
    let result = async {
        let Path(id) = id?;
        let cupcake = state.cupcakes().fetch(id).await?;
        Ok::<_, ApiError>(Json(CupcakeBody { cupcake }))
    }
    .await;
    observe("show", result)
}

/// `POST /api/cupcakes`
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CupcakePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<CupcakeBody>), ApiError> {
    let result = async {
        let Json(payload) = payload?;
        let new_cupcake = payload.into_new_cupcake().inspect_err(|err| {
            warn!(stage = "api", error = ?err, "rejected cupcake creation payload");
        })?;
        let cupcake = state.cupcakes().create(&new_cupcake).await?;
        info!(stage = "api", id = cupcake.id, flavor = %cupcake.flavor, "cupcake created");
        Ok::<_, ApiError>((StatusCode::CREATED, Json(CupcakeBody { cupcake })))
    }
    .await;
    observe("create", result)
}

/// `PATCH /api/cupcakes/:id`
///
/// Every field is overwritten, so the body must carry all four keys. The body
/// is validated before the lookup: an unknown id with an invalid body is 400.
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CupcakePayload>, JsonRejection>,
) -> Result<Json<CupcakeBody>, ApiError> {
    let result = async {
        let Path(id) = id?;
        let Json(payload) = payload?;
        let changes = payload.into_changes().inspect_err(|err| {
            warn!(stage = "api", id, error = ?err, "rejected cupcake update payload");
        })?;
        let cupcake = state.cupcakes().update(id, &changes).await?;
        info!(stage = "api", id, "cupcake updated");
        Ok::<_, ApiError>(Json(CupcakeBody { cupcake }))
    }
    .await;
    observe("update", result)
}

/// `DELETE /api/cupcakes/:id`
pub async fn remove(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let result = async {
        let Path(id) = id?;
        state.cupcakes().delete(id).await?;
        info!(stage = "api", id, "cupcake deleted");
        Ok::<_, ApiError>(Json(MessageBody {
            message: "Cupcake deleted",
        }))
    }
    .await;
    observe("delete", result)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::router::{app_router, test_state};

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("handler should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn send_raw(
        app: &Router,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(Method::POST).uri("/api/cupcakes");
        if let Some(value) = content_type {
            builder = builder.header(header::CONTENT_TYPE, value);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("handler should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    async fn setup_app() -> Router {
        app_router(test_state().await)
    }

    fn chocolate() -> Value {
        json!({
            "flavor": "Chocolate",
            "size": "Large",
            "rating": 8.5,
            "image": ""
        })
    }

    #[tokio::test]
    async fn create_returns_created_cupcake_with_placeholder_image() {
        let app = setup_app().await;

        let (status, body) = send(&app, Method::POST, "/api/cupcakes", Some(chocolate())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({
                "cupcake": {
                    "id": 1,
                    "flavor": "Chocolate",
                    "size": "Large",
                    "rating": 8.5,
                    "image": "https://tinyurl.com/demo-cupcake"
                }
            })
        );
    }

    #[tokio::test]
    async fn show_returns_what_create_stored() {
        let app = setup_app().await;
        let payload = json!({
            "flavor": "Cherry",
            "size": "Small",
            "rating": 9,
            "image": "https://example.com/cherry.png"
        });
        let (_, created) = send(&app, Method::POST, "/api/cupcakes", Some(payload)).await;
        let id = created["cupcake"]["id"].as_i64().expect("id");
        assert!(id > 0);

        let (status, body) = send(&app, Method::GET, &format!("/api/cupcakes/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cupcake"], created["cupcake"]);
        assert_eq!(body["cupcake"]["image"], "https://example.com/cherry.png");
    }

    #[tokio::test]
    async fn list_returns_all_cupcakes() {
        let app = setup_app().await;
        let (status, body) = send(&app, Method::GET, "/api/cupcakes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "cupcakes": [] }));

        send(&app, Method::POST, "/api/cupcakes", Some(chocolate())).await;
        send(&app, Method::POST, "/api/cupcakes", Some(chocolate())).await;

        let (_, body) = send(&app, Method::GET, "/api/cupcakes", None).await;
        let cupcakes = body["cupcakes"].as_array().expect("array");
        assert_eq!(cupcakes.len(), 2);
        let keys: Vec<&String> = cupcakes[0].as_object().expect("object").keys().collect();
        assert_eq!(keys.len(), 5);
    }

    #[tokio::test]
    async fn create_with_missing_flavor_is_rejected_without_side_effects() {
        let app = setup_app().await;
        let payload = json!({ "size": "Large", "rating": 8.5, "image": "" });

        let (status, body) = send(&app, Method::POST, "/api/cupcakes", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing required fields" }));

        let (_, list) = send(&app, Method::GET, "/api/cupcakes", None).await;
        assert_eq!(list["cupcakes"].as_array().expect("array").len(), 0);
    }

    #[tokio::test]
    async fn create_rejects_mistyped_fields() {
        let app = setup_app().await;
        let payload = json!({ "flavor": 12, "size": "Large", "rating": 8.5, "image": "" });

        let (status, body) = send(&app, Method::POST, "/api/cupcakes", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "invalid_payload");
    }

    #[tokio::test]
    async fn create_rejects_overlong_size() {
        let app = setup_app().await;
        let payload = json!({
            "flavor": "Chocolate",
            "size": "s".repeat(21),
            "rating": 8.5,
            "image": ""
        });

        let (status, body) = send(&app, Method::POST, "/api/cupcakes", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "field_too_long");
    }

    #[tokio::test]
    async fn create_accepts_rating_from_form_text() {
        let app = setup_app().await;
        let payload = json!({
            "flavor": "Lemon",
            "size": "Medium",
            "rating": "7.5",
            "image": null
        });

        let (status, body) = send(&app, Method::POST, "/api/cupcakes", Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["cupcake"]["rating"], 7.5);
        assert_eq!(body["cupcake"]["image"], "https://tinyurl.com/demo-cupcake");
    }

    #[tokio::test]
    async fn show_unknown_id_is_not_found() {
        let app = setup_app().await;

        let (status, body) = send(&app, Method::GET, "/api/cupcakes/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "cupcake_not_found");

        let (status, _) = send(&app, Method::GET, "/api/cupcakes/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_replaces_all_fields() {
        let app = setup_app().await;
        let (_, created) = send(&app, Method::POST, "/api/cupcakes", Some(chocolate())).await;
        let id = created["cupcake"]["id"].as_i64().expect("id");

        let replacement = json!({
            "flavor": "Strawberry",
            "size": "Medium",
            "rating": 4.0,
            "image": "https://example.com/s.png"
        });
        let uri = format!("/api/cupcakes/{id}");
        let (status, body) = send(&app, Method::PATCH, &uri, Some(replacement)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "cupcake": {
                    "id": id,
                    "flavor": "Strawberry",
                    "size": "Medium",
                    "rating": 4.0,
                    "image": "https://example.com/s.png"
                }
            })
        );

        let (_, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched, body);
    }

    #[tokio::test]
    async fn update_requires_every_field() {
        let app = setup_app().await;
        let (_, created) = send(&app, Method::POST, "/api/cupcakes", Some(chocolate())).await;
        let id = created["cupcake"]["id"].as_i64().expect("id");
        let uri = format!("/api/cupcakes/{id}");

        let (status, body) =
            send(&app, Method::PATCH, &uri, Some(json!({ "rating": 1.0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing required fields" }));

        let (_, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched["cupcake"], created["cupcake"]);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let app = setup_app().await;
        let (status, _) = send(&app, Method::PATCH, "/api/cupcakes/5", Some(chocolate())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_then_show_is_not_found() {
        let app = setup_app().await;
        let (_, created) = send(&app, Method::POST, "/api/cupcakes", Some(chocolate())).await;
        let uri = format!("/api/cupcakes/{}", created["cupcake"]["id"]);

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Cupcake deleted" }));

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_without_json_content_type_is_unsupported() {
        let app = setup_app().await;
        let body = chocolate().to_string();

        let (status, problem) = send_raw(&app, None, &body).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(problem["type"], "invalid_payload");

        let (status, _) = send_raw(&app, Some("text/plain"), &body).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let (_, list) = send(&app, Method::GET, "/api/cupcakes", None).await;
        assert_eq!(list["cupcakes"].as_array().expect("array").len(), 0);
    }

    #[tokio::test]
    async fn create_with_malformed_json_is_bad_request() {
        let app = setup_app().await;

        let (status, problem) =
            send_raw(&app, Some("application/json"), r#"{"flavor":"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["type"], "invalid_payload");
        assert_eq!(problem["title"], "Bad Request");
    }

    #[tokio::test]
    async fn create_rejects_overlong_image() {
        let app = setup_app().await;
        let payload = json!({
            "flavor": "Chocolate",
            "size": "Large",
            "rating": 8.5,
            "image": "i".repeat(201)
        });

        let (status, body) = send(&app, Method::POST, "/api/cupcakes", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "field_too_long");
        assert_eq!(body["detail"], "image must be at most 200 characters");
    }

    #[tokio::test]
    async fn update_stores_empty_image_verbatim() {
        let app = setup_app().await;
        let payload = json!({
            "flavor": "Cherry",
            "size": "Small",
            "rating": 9,
            "image": "https://example.com/cherry.png"
        });
        let (_, created) = send(&app, Method::POST, "/api/cupcakes", Some(payload)).await;
        let uri = format!("/api/cupcakes/{}", created["cupcake"]["id"]);

        let (status, body) = send(&app, Method::PATCH, &uri, Some(chocolate())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cupcake"]["image"], "");

        let (_, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched["cupcake"]["image"], "");
    }

    #[tokio::test]
    async fn update_and_delete_non_integer_id_are_not_found() {
        let app = setup_app().await;

        let (status, body) =
            send(&app, Method::PATCH, "/api/cupcakes/abc", Some(chocolate())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "cupcake_not_found");

        let (status, body) = send(&app, Method::DELETE, "/api/cupcakes/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "cupcake_not_found");
    }
}
