//! HTTP handlers: `POST /fetch`, `POST /batch`, `GET /health`,
//! `DELETE /cache/{hash}`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::Json;
use iris_fetch::MAX_BATCH_SIZE;
use iris_types::model::{FetchRequest, FetchResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::health::{self, HealthResponse};
use crate::state::AppState;

/// `Json<T>` extractor whose rejection is mapped into the service's usual
/// `{error: {...}}` envelope at 422, instead of axum's bare-text 400.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::MalformedBody(rejection.body_text()))?;
        Ok(ValidatedJson(value))
    }
}

/// `/fetch` always answers 200 on a reachable service; failures are
/// carried in `FetchResult.error`, never surfaced as a 4xx/5xx here.
/// A malformed request body is the one exception: it never reaches the
/// fetcher at all, so it gets the usual error envelope at 422.
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<FetchRequest>,
) -> Json<FetchResult> {
    Json(state.fetcher.fetch(&request).await)
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<FetchRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<FetchResult>,
}

pub async fn batch(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    if body.requests.len() > MAX_BATCH_SIZE {
        return Err(ApiError::BatchTooLarge {
            requested: body.requests.len(),
            max: MAX_BATCH_SIZE,
        });
    }

    let results = state.fetcher.fetch_batch(&body.requests).await;
    Ok(Json(BatchResponse { results }))
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(health::check_health(&state).await)
}

pub async fn delete_cache_entry(
    State(state): State<Arc<AppState>>,
    Path(fingerprint): Path<String>,
) -> Result<axum::http::StatusCode, ApiError> {
    if fingerprint.len() != 64 || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiError::InvalidCacheKey(fingerprint));
    }

    state.cache.invalidate(&fingerprint).await;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    async fn echo(ValidatedJson(body): ValidatedJson<serde_json::Value>) -> Json<serde_json::Value> {
        Json(body)
    }

    #[tokio::test]
    async fn malformed_json_body_maps_to_422_envelope() {
        let app = Router::new().route("/echo", post(echo));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("content-type", "application/json")
                    .body(Body::from("{not valid json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn well_formed_json_body_passes_through() {
        let app = Router::new().route("/echo", post(echo));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"ok":true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn rejects_non_hex_cache_keys_before_hitting_the_store() {
        let valid = "a".repeat(64);
        assert!(valid.chars().all(|c| c.is_ascii_hexdigit()));

        let invalid = "not-a-sha256-hash";
        assert!(invalid.len() != 64 || !invalid.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
