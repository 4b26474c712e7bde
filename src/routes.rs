use actix_web::{
    error::BlockingError,
    http::{header::ContentType, StatusCode},
    web::{self, Bytes},
    HttpResponse, ResponseError,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::log::{LogError, RecordLog};
use crate::models::{ConsumeRequest, ConsumeResponse, ProduceRequest, ProduceResponse};

/// Failures of a single request, each mapped to its own status code.
///
/// An unknown offset is answered with `404` instead of the generic `500`
/// used for other log failures, so clients can tell a miss from a fault.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Decode(serde_json::Error),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("failed to encode response: {0}")]
    Encode(serde_json::Error),

    #[error("log operation was canceled")]
    Blocking(#[from] BlockingError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Decode(_) => StatusCode::BAD_REQUEST,
            ApiError::Log(LogError::OffsetNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Log(LogError::RecordTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Log(_) | ApiError::Encode(_) | ApiError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "rejected request");
        }
        HttpResponse::build(status)
            .content_type(ContentType::plaintext())
            .body(self.to_string())
    }
}

/// Mounts the log endpoints. The log itself must be registered as
/// `web::Data<dyn RecordLog>` app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(consume))
            .route(web::post().to(produce))
            .default_service(web::to(method_not_allowed)),
    );
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().finish()
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

async fn consume(log: web::Data<dyn RecordLog>, body: Bytes) -> Result<HttpResponse, ApiError> {
    let ConsumeRequest { offset } = decode(&body)?;

    let record = web::block(move || log.read(offset)).await??;
    tracing::debug!(offset, "read record");

    respond(&ConsumeResponse { record })
}

async fn produce(log: web::Data<dyn RecordLog>, body: Bytes) -> Result<HttpResponse, ApiError> {
    let ProduceRequest { record } = decode(&body)?;

    let offset = web::block(move || log.append(record)).await??;

    respond(&ProduceResponse { offset })
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::Decode)
}

// serialize fully before the status goes out, so a failure is still a clean 500
fn respond<T: Serialize>(body: &T) -> Result<HttpResponse, ApiError> {
    let buf = serde_json::to_vec(body).map_err(ApiError::Encode)?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(buf))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use actix_web::{test, App};
    use serde_json::{json, Value};

    use super::*;
    use crate::log::{ConfigBuilder, MemoryLog, SegmentedLog};
    use crate::models::Record;

    fn log_data(log: impl RecordLog + 'static) -> web::Data<dyn RecordLog> {
        let log: Arc<dyn RecordLog> = Arc::new(log);
        web::Data::from(log)
    }

    macro_rules! app {
        ($log:expr) => {
            test::init_service(
                App::new()
                    .app_data($log)
                    .configure(configure)
                    .default_service(web::to(not_found)),
            )
            .await
        };
    }

    fn get(body: &str) -> test::TestRequest {
        test::TestRequest::get()
            .uri("/")
            .set_payload(body.to_owned())
    }

    fn post(body: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/")
            .set_payload(body.to_owned())
    }

    #[actix_web::test]
    async fn produce_then_consume() {
        let app = app!(log_data(MemoryLog::new()));

        let resp = test::call_service(&app, post(r#"{"record":{"value":"aGVsbG8="}}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "offset": 0 }));

        let resp = test::call_service(&app, get(r#"{"offset":0}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["record"]["value"], "aGVsbG8=");
        assert_eq!(body["record"]["offset"], 0);
    }

    #[actix_web::test]
    async fn consume_on_empty_log_is_404_not_500() {
        let app = app!(log_data(MemoryLog::new()));

        let resp = test::call_service(&app, get(r#"{"offset":0}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = test::read_body(resp).await;
        assert_eq!(body, Bytes::from_static(b"offset 0 not found"));
    }

    #[actix_web::test]
    async fn malformed_bodies_are_bad_requests() {
        let app = app!(log_data(MemoryLog::new()));

        let resp = test::call_service(&app, post("{").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!test::read_body(resp).await.is_empty());

        let resp = test::call_service(&app, get(r#"{"offset":"zero"}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, get("").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp =
            test::call_service(&app, post(r#"{"record":{"value":"%%%"}}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn empty_objects_use_zero_values() {
        let app = app!(log_data(MemoryLog::new()));

        let resp = test::call_service(&app, get("{}").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(&app, post("{}").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: ProduceResponse = test::read_body_json(resp).await;
        assert_eq!(body.offset, 0);

        let resp = test::call_service(&app, post(r#"{"record":{}}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: ProduceResponse = test::read_body_json(resp).await;
        assert_eq!(body.offset, 1);

        let resp = test::call_service(&app, get("{}").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "record": { "value": "", "offset": 0 } }));
    }

    #[actix_web::test]
    async fn other_methods_are_not_allowed() {
        let app = app!(log_data(MemoryLog::new()));

        for req in [
            test::TestRequest::put().uri("/"),
            test::TestRequest::delete().uri("/"),
            test::TestRequest::patch().uri("/"),
        ] {
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert!(test::read_body(resp).await.is_empty());
        }
    }

    #[actix_web::test]
    async fn unknown_paths_are_not_found() {
        let app = app!(log_data(MemoryLog::new()));

        let resp = test::call_service(&app, test::TestRequest::get().uri("/records").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn concurrent_produces_get_distinct_offsets() {
        let app = app!(log_data(MemoryLog::new()));

        let (a, b) = tokio::join!(
            test::call_service(&app, post(r#"{"record":{"value":"YQ=="}}"#).to_request()),
            test::call_service(&app, post(r#"{"record":{"value":"Yg=="}}"#).to_request()),
        );
        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::OK);

        let a: ProduceResponse = test::read_body_json(a).await;
        let b: ProduceResponse = test::read_body_json(b).await;
        let mut offsets = vec![a.offset, b.offset];
        offsets.sort_unstable();
        assert_eq!(offsets, vec![0, 1]);
    }

    #[actix_web::test]
    async fn shares_one_log_across_requests() {
        let log = Arc::new(MemoryLog::new());
        log.append(Record::new("seeded")).unwrap();
        let data: web::Data<dyn RecordLog> = web::Data::from(log.clone() as Arc<dyn RecordLog>);
        let app = app!(data);

        let resp = test::call_service(&app, post(r#"{"record":{"value":"bmV4dA=="}}"#).to_request()).await;
        let body: ProduceResponse = test::read_body_json(resp).await;
        assert_eq!(body.offset, 1);
        assert_eq!(log.read(1).unwrap().value, b"next");
    }

    #[actix_web::test]
    async fn oversized_record_is_payload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new(1024, 1024, 0)
            .with_max_record_bytes(2)
            .build()
            .unwrap();
        let app = app!(log_data(SegmentedLog::open(dir.path(), config).unwrap()));

        let resp = test::call_service(&app, post(r#"{"record":{"value":"aGVsbG8="}}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = test::call_service(&app, post(r#"{"record":{"value":"aGk="}}"#).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, get(r#"{"offset":0}"#).to_request()).await;
        let body: ConsumeResponse = test::read_body_json(resp).await;
        assert_eq!(body.record.value, b"hi");
    }

    #[actix_web::test]
    async fn store_failures_are_server_errors() {
        assert_eq!(
            ApiError::Log(LogError::Poisoned).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Log(LogError::OffsetNotFound(3)).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
