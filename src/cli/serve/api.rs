//! REST routes.
//!
//! | Method     | Path               | Result                                  |
//! |------------|--------------------|-----------------------------------------|
//! | GET        | `/api/data`        | current document                        |
//! | POST       | `/api/data`        | replace document, broadcast to sessions |
//! | GET, POST  | `/api/ftq/predict` | prediction over the document or `defects` |
//! | GET        | `/api/health`      | liveness and session count              |
//! | OPTIONS    | any                | CORS preflight                          |
//!
//! Routing is a pure function of the request so it can be tested without a
//! listening socket.

use serde_json::{Value, json};
use tiny_http::Method;

use crate::hub::{Origin, SyncHub};
use crate::log;
use crate::predict::{PredictError, Predictor, StatisticalPredictor};

/// Status and JSON body of a REST reply. `body` is `None` only for 204.
#[derive(Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body: Some(body) }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(json!({ "error": message.into() })),
        }
    }

    fn no_content() -> Self {
        Self { status: 204, body: None }
    }

    pub fn unavailable() -> Self {
        Self::error(503, "server is shutting down")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(400, message)
    }
}

/// Dispatch one request.
pub fn route(method: &Method, url: &str, body: &[u8], hub: &SyncHub) -> ApiResponse {
    if *method == Method::Options {
        return ApiResponse::no_content();
    }

    match (method, path_of(url)) {
        (Method::Get, "/api/data") => ApiResponse::ok(hub.read()),
        (Method::Post, "/api/data") => replace_document(body, hub),
        (Method::Get | Method::Post, "/api/ftq/predict") => predict(body, hub),
        (Method::Get, "/api/health") => ApiResponse::ok(json!({
            "status": "ok",
            "sessions": hub.session_count(),
            "document": hub.store().path().display().to_string(),
        })),
        _ => ApiResponse::error(404, "not found"),
    }
}

fn replace_document(body: &[u8], hub: &SyncHub) -> ApiResponse {
    let document: Value = match serde_json::from_slice(body) {
        Ok(document) => document,
        Err(e) => return ApiResponse::bad_request(format!("invalid JSON body: {e}")),
    };

    match hub.apply_update(Origin::Rest, &document) {
        Ok(committed) => ApiResponse::ok(committed),
        Err(e) => {
            log!("api"; "update rejected: {}", e);
            ApiResponse::error(500, e.reason())
        }
    }
}

/// Predict over the posted `defects`, or over the current document when the
/// body has none. Replies use the `{"status", "prediction"}` envelope.
fn predict(body: &[u8], hub: &SyncHub) -> ApiResponse {
    let posted = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<Value>(body) {
            Ok(mut request) => request.get_mut("defects").map(Value::take),
            Err(e) => return prediction_failed(400, format!("invalid JSON body: {e}")),
        }
    };

    let result = match posted {
        Some(Value::Array(defects)) => StatisticalPredictor.predict(&defects),
        Some(_) => Err(PredictError::NotAnArray),
        None => hub.predict(&StatisticalPredictor),
    };

    match result {
        Ok(prediction) => ApiResponse::ok(json!({
            "status": "success",
            "prediction": prediction,
        })),
        Err(e) => prediction_failed(422, e.to_string()),
    }
}

fn prediction_failed(status: u16, message: String) -> ApiResponse {
    ApiResponse {
        status,
        body: Some(json!({ "status": "error", "error": message })),
    }
}

/// Path without query string or trailing slash.
fn path_of(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStore;
    use crossbeam::channel::unbounded;
    use tempfile::TempDir;

    fn make_hub() -> (TempDir, SyncHub) {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::open(temp.path().join("data").join("data.json")).unwrap();
        (temp, SyncHub::new(store))
    }

    #[test]
    fn test_get_data() {
        let (_temp, hub) = make_hub();
        let reply = route(&Method::Get, "/api/data", b"", &hub);
        assert_eq!(reply, ApiResponse::ok(json!([])));
    }

    #[test]
    fn test_post_data_broadcasts() {
        let (_temp, hub) = make_hub();
        let (tx, rx) = unbounded();
        hub.connect(Box::new(tx));
        let _initial = rx.try_recv().unwrap();

        let reply = route(&Method::Post, "/api/data", br#"[{"id":7}]"#, &hub);

        assert_eq!(reply, ApiResponse::ok(json!([{"id": 7}])));
        assert_eq!(hub.read(), json!([{"id": 7}]));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_post_malformed_body() {
        let (_temp, hub) = make_hub();
        hub.apply_update(Origin::Rest, &json!(["keep"])).unwrap();

        let reply = route(&Method::Post, "/api/data", b"{oops", &hub);

        assert_eq!(reply.status, 400);
        assert_eq!(hub.read(), json!(["keep"]));
    }

    #[test]
    fn test_post_store_failure() {
        let (temp, hub) = make_hub();
        std::fs::remove_dir_all(temp.path().join("data")).unwrap();

        let reply = route(&Method::Post, "/api/data", b"[1]", &hub);

        assert_eq!(reply, ApiResponse::error(500, "update could not be saved"));
    }

    #[test]
    fn test_predict_current_document() {
        let (_temp, hub) = make_hub();
        hub.apply_update(Origin::Rest, &json!([{"Success": 1}, {"Success": 1}]))
            .unwrap();

        let reply = route(&Method::Get, "/api/ftq/predict", b"", &hub);
        assert_eq!(reply.status, 200);
        let body = reply.body.unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["prediction"]["current_ftq"], 100.0);
        assert_eq!(body["prediction"]["total_defects"], 2);
        assert!(body["prediction"]["line_analysis"]["best_motor_line"].is_string());

        // POST without `defects` falls back to the document
        let reply = route(&Method::Post, "/api/ftq/predict?x=1", br#"{"other": 1}"#, &hub);
        assert_eq!(reply.body.unwrap()["prediction"]["total_defects"], 2);
    }

    #[test]
    fn test_predict_posted_defects() {
        let (_temp, hub) = make_hub();
        hub.apply_update(Origin::Rest, &json!([{"Success": 1}])).unwrap();

        let body = br#"{"defects": [
            {"Area": "Motor", "Line": "Line 3", "Success": 0, "Rework_time": 70},
            {"Area": "Motor", "Line": "Line 3", "Success": 1, "Rework_time": 50},
            {"Area": "Motor", "Line": "Line 1", "Success": 1, "Rework_time": 30},
            {"Area": "Motor", "Line": "Line 1", "Success": 1, "Rework_time": 30}
        ]}"#;
        let reply = route(&Method::Post, "/api/ftq/predict", body, &hub);

        assert_eq!(reply.status, 200);
        let body = reply.body.unwrap();
        let prediction = &body["prediction"];
        assert_eq!(prediction["total_defects"], 4);
        assert_eq!(prediction["current_ftq"], 75.0);
        assert_eq!(prediction["avg_rework_time"], 45.0);
        assert_eq!(prediction["line_analysis"]["best_motor_line"], "Motor Line 1");
        assert_eq!(prediction["line_analysis"]["worst_motor_line"], "Motor Line 3");
        // The document itself was not used or touched
        assert_eq!(hub.read(), json!([{"Success": 1}]));
    }

    #[test]
    fn test_predict_unusable_input() {
        let (_temp, hub) = make_hub();

        // Empty array has no records
        let reply = route(&Method::Get, "/api/ftq/predict", b"", &hub);
        assert_eq!(reply.status, 422);
        assert_eq!(reply.body.unwrap()["status"], "error");

        hub.apply_update(Origin::Rest, &json!({"a": 1})).unwrap();
        assert_eq!(route(&Method::Get, "/api/ftq/predict", b"", &hub).status, 422);

        let reply = route(&Method::Post, "/api/ftq/predict", br#"{"defects": 5}"#, &hub);
        assert_eq!(reply.status, 422);

        let reply = route(&Method::Post, "/api/ftq/predict", b"{oops", &hub);
        assert_eq!(reply.status, 400);
    }

    #[test]
    fn test_health() {
        let (_temp, hub) = make_hub();
        let reply = route(&Method::Get, "/api/health/", b"", &hub);

        let body = reply.body.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);
        assert!(body["document"].as_str().unwrap().ends_with("data.json"));
    }

    #[test]
    fn test_options_and_not_found() {
        let (_temp, hub) = make_hub();

        assert_eq!(route(&Method::Options, "/anything", b"", &hub), ApiResponse::no_content());
        assert_eq!(route(&Method::Get, "/nope", b"", &hub).status, 404);
        assert_eq!(route(&Method::Delete, "/api/data", b"", &hub).status, 404);
    }

    #[test]
    fn test_path_of() {
        assert_eq!(path_of("/api/data?pretty=1"), "/api/data");
        assert_eq!(path_of("/api/data/"), "/api/data");
        assert_eq!(path_of("/"), "/");
    }
}
