//! HTTP submission surface: `POST /approve`, `GET /healthz`, `GET /readyz`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use proto::{ApprovalAck, ApprovalRequest, Callback, Link, Markup, SubmitError};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::action::MAX_CORRELATION_ID_LEN;
use crate::coordinator::ApprovalService;

/// At most this many references are rendered.
pub const MAX_LINKS: usize = 5;

const MIN_TEXT_LEN: usize = 10;
const MAX_TEXT_LEN: usize = 500;

// ─── Readiness ─────────────────────────────────────────────

/// Shared readiness bit backing `/readyz`.
#[derive(Debug, Clone, Default)]
pub struct ReadyFlag(Arc<AtomicBool>);

impl ReadyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── Request body ──────────────────────────────────────────

/// Raw `/approve` body before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmitBody {
    pub correlation_id: String,
    pub tool: String,
    pub arguments: Option<serde_json::Value>,
    pub justification: String,
    pub approval_request: String,
    pub risk_assessment: String,
    pub links_to_code: Vec<LinkBody>,
    pub lang: String,
    pub markup: String,
    pub callback: Option<CallbackBody>,
    pub timeout_sec: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LinkBody {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackBody {
    pub url: String,
}

/// Checks a submission and turns it into a request plus optional timeout override.
pub fn validate(
    body: SubmitBody,
    default_lang: &str,
) -> Result<(ApprovalRequest, Option<Duration>), SubmitError> {
    let correlation_id = body.correlation_id.trim().to_string();
    if correlation_id.is_empty() {
        return Err(invalid("correlation_id is required"));
    }
    if correlation_id.len() > MAX_CORRELATION_ID_LEN {
        return Err(invalid(format!(
            "correlation_id must be at most {MAX_CORRELATION_ID_LEN} bytes"
        )));
    }
    if body.tool.trim().is_empty() {
        return Err(invalid("tool is required"));
    }

    let arguments = match body.arguments {
        None | Some(serde_json::Value::Null) => serde_json::Map::new(),
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => return Err(invalid("arguments must be an object")),
    };

    check_text_len("justification", &body.justification)?;
    check_text_len("approval_request", &body.approval_request)?;
    check_text_len("risk_assessment", &body.risk_assessment)?;

    let mut links = body.links_to_code;
    links.truncate(MAX_LINKS);
    let links = links
        .into_iter()
        .map(|link| {
            if link.text.trim().is_empty() || link.url.trim().is_empty() {
                Err(invalid("links_to_code items must include text and url"))
            } else {
                Ok(Link {
                    text: link.text,
                    url: link.url,
                })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let markup: Markup = body
        .markup
        .parse()
        .map_err(|_| invalid("markup must be markdown or html"))?;

    let callback_url = body
        .callback
        .map(|c| c.url.trim().to_string())
        .unwrap_or_default();
    if callback_url.is_empty() {
        return Err(invalid("callback.url is required for async approval"));
    }
    match reqwest::Url::parse(&callback_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => return Err(invalid("callback.url must be an http(s) URL")),
    }

    let lang = match body.lang.trim() {
        "" => default_lang.to_string(),
        lang => lang.to_lowercase(),
    };
    let timeout = body
        .timeout_sec
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs.unsigned_abs()));

    let request = ApprovalRequest {
        correlation_id,
        tool: body.tool.trim().to_string(),
        arguments,
        justification: body.justification,
        approval_request: body.approval_request,
        risk_assessment: body.risk_assessment,
        links_to_code: links,
        lang,
        markup,
        callback: Callback { url: callback_url },
    };
    Ok((request, timeout))
}

fn check_text_len(field: &str, value: &str) -> Result<(), SubmitError> {
    if value.is_empty() {
        return Ok(());
    }
    let len = value.trim().chars().count();
    if !(MIN_TEXT_LEN..=MAX_TEXT_LEN).contains(&len) {
        return Err(invalid(format!(
            "{field} must be {MIN_TEXT_LEN}-{MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> SubmitError {
    SubmitError::Invalid(reason.into())
}

fn status_for(err: &SubmitError) -> StatusCode {
    match err {
        SubmitError::Invalid(_) => StatusCode::BAD_REQUEST,
        SubmitError::AlreadyExists(_) => StatusCode::CONFLICT,
        SubmitError::Notification(_) => StatusCode::BAD_GATEWAY,
    }
}

// ─── Router ────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    service: ApprovalService,
    ready: ReadyFlag,
}

/// Builds the submission router.
pub fn router(service: ApprovalService, ready: ReadyFlag) -> Router {
    Router::new()
        .route("/approve", post(approve_handler))
        .route("/healthz", get(health_handler))
        .route("/readyz", get(ready_handler))
        .with_state(AppState { service, ready })
        .layer(TraceLayer::new_for_http())
}

async fn approve_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let body: SubmitBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            debug!("Rejecting malformed /approve body: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApprovalAck::error("invalid json payload", None)),
            );
        }
    };

    let echo_id = Some(body.correlation_id.trim().to_string()).filter(|id| !id.is_empty());
    let default_lang = state.service.catalog().default_lang().to_string();
    let (request, timeout) = match validate(body, &default_lang) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Rejecting /approve request: {e}");
            return (status_for(&e), Json(ApprovalAck::error(e.to_string(), echo_id)));
        }
    };

    match state.service.submit(request, timeout).await {
        Ok(ack) => (StatusCode::ACCEPTED, Json(ack)),
        Err(e) => {
            warn!(correlation_id = ?echo_id, "Approval request failed: {e}");
            (status_for(&e), Json(ApprovalAck::error(e.to_string(), echo_id)))
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.ready.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(value: serde_json::Value) -> SubmitBody {
        serde_json::from_value(value).expect("body")
    }

    fn minimal() -> serde_json::Value {
        json!({
            "correlation_id": "req-1",
            "tool": "kubectl_delete",
            "callback": { "url": "http://127.0.0.1:9000/hook" },
        })
    }

    fn reason(result: Result<(ApprovalRequest, Option<Duration>), SubmitError>) -> String {
        match result {
            Err(SubmitError::Invalid(reason)) => reason,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_body_gets_defaults() {
        let (req, timeout) = validate(body(minimal()), "ru").expect("valid");
        assert_eq!(req.correlation_id, "req-1");
        assert_eq!(req.lang, "ru");
        assert_eq!(req.markup, Markup::Markdown);
        assert!(req.arguments.is_empty());
        assert_eq!(timeout, None);
    }

    #[test]
    fn required_fields_are_enforced() {
        let mut v = minimal();
        v["correlation_id"] = json!("  ");
        assert_eq!(reason(validate(body(v), "en")), "correlation_id is required");

        let mut v = minimal();
        v["tool"] = json!("");
        assert_eq!(reason(validate(body(v), "en")), "tool is required");

        let mut v = minimal();
        v["callback"] = json!({});
        assert_eq!(
            reason(validate(body(v), "en")),
            "callback.url is required for async approval"
        );

        let mut v = minimal();
        v["callback"] = json!({ "url": "ftp://host/x" });
        assert!(reason(validate(body(v), "en")).starts_with("callback.url"));
    }

    #[test]
    fn long_correlation_id_is_rejected() {
        let mut v = minimal();
        v["correlation_id"] = json!("x".repeat(MAX_CORRELATION_ID_LEN + 1));
        assert!(reason(validate(body(v), "en")).contains("at most 48 bytes"));
    }

    #[test]
    fn free_text_fields_need_ten_to_five_hundred_chars() {
        let mut v = minimal();
        v["justification"] = json!("too short");
        assert_eq!(
            reason(validate(body(v), "en")),
            "justification must be 10-500 characters"
        );

        let mut v = minimal();
        v["risk_assessment"] = json!("r".repeat(501));
        assert_eq!(
            reason(validate(body(v), "en")),
            "risk_assessment must be 10-500 characters"
        );

        let mut v = minimal();
        v["approval_request"] = json!("Delete the stale pods");
        validate(body(v), "en").expect("valid description");
    }

    #[test]
    fn links_are_truncated_then_checked() {
        let mut v = minimal();
        let mut links: Vec<_> = (0..5)
            .map(|i| json!({ "text": format!("l{i}"), "url": format!("https://x/{i}") }))
            .collect();
        links.push(json!({ "text": "", "url": "" }));
        v["links_to_code"] = json!(links);
        let (req, _) = validate(body(v), "en").expect("sixth link dropped");
        assert_eq!(req.links_to_code.len(), MAX_LINKS);

        let mut v = minimal();
        v["links_to_code"] = json!([{ "text": "only text" }]);
        assert_eq!(
            reason(validate(body(v), "en")),
            "links_to_code items must include text and url"
        );
    }

    #[test]
    fn markup_arguments_lang_and_timeout_are_parsed() {
        let mut v = minimal();
        v["markup"] = json!("HTML");
        v["lang"] = json!("EN");
        v["arguments"] = json!({ "namespace": "prod" });
        v["timeout_sec"] = json!(90);
        let (req, timeout) = validate(body(v), "ru").expect("valid");
        assert_eq!(req.markup, Markup::Html);
        assert_eq!(req.lang, "en");
        assert_eq!(req.arguments["namespace"], "prod");
        assert_eq!(timeout, Some(Duration::from_secs(90)));

        let mut v = minimal();
        v["markup"] = json!("bbcode");
        assert_eq!(
            reason(validate(body(v), "en")),
            "markup must be markdown or html"
        );

        let mut v = minimal();
        v["arguments"] = json!([1, 2]);
        assert_eq!(
            reason(validate(body(v), "en")),
            "arguments must be an object"
        );

        let mut v = minimal();
        v["timeout_sec"] = json!(-5);
        let (_, timeout) = validate(body(v), "en").expect("valid");
        assert_eq!(timeout, None);
    }

    #[test]
    fn submit_errors_map_to_status_codes() {
        assert_eq!(
            status_for(&SubmitError::Invalid("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SubmitError::AlreadyExists("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SubmitError::Notification(proto::ChannelError::Closed)),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn ready_flag_is_shared_between_clones() {
        let flag = ReadyFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_ready());
        flag.set(true);
        assert!(clone.is_ready());
    }
}
