use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, Router, extract::State, routing::post};
use parking_lot::Mutex;
use proto::{
    ApprovalRequest, AudioClip, Callback, ChannelError, ChatTransport, Keyboard, Markup,
    MessageId, OutgoingMessage, SpeechError, Transcriber, VoiceFile,
};
use serde_json::Value;

pub(crate) fn sample_request(correlation_id: &str) -> ApprovalRequest {
    ApprovalRequest {
        correlation_id: correlation_id.to_string(),
        tool: "kubectl_delete".to_string(),
        arguments: serde_json::Map::new(),
        justification: String::new(),
        approval_request: String::new(),
        risk_assessment: String::new(),
        links_to_code: Vec::new(),
        lang: "en".to_string(),
        markup: Markup::Markdown,
        callback: Callback {
            url: String::new(),
        },
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Edit {
    pub message_id: MessageId,
    pub text: String,
    pub markup: Markup,
    pub keyboard: Keyboard,
}

#[derive(Default)]
struct Recorded {
    sent: Vec<OutgoingMessage>,
    edits: Vec<Edit>,
    deleted: Vec<MessageId>,
    answers: Vec<(String, Option<String>)>,
    voice: Option<VoiceFile>,
}

/// In-memory transport that records every call.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    recorded: Mutex<Recorded>,
    next_id: AtomicI32,
    fail_sends: AtomicBool,
    fail_edits: AtomicBool,
}

impl RecordingTransport {
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn set_voice(&self, voice: VoiceFile) {
        self.recorded.lock().voice = Some(voice);
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.recorded.lock().sent.clone()
    }

    pub fn edits(&self) -> Vec<Edit> {
        self.recorded.lock().edits.clone()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.recorded.lock().deleted.clone()
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.recorded.lock().answers.clone()
    }

    /// Id handed out by the most recent successful send.
    pub fn last_message_id(&self) -> MessageId {
        100 + self.next_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, message: OutgoingMessage) -> Result<MessageId, ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed("chat unavailable".to_string()));
        }
        self.recorded.lock().sent.push(message);
        Ok(100 + self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn edit_message(
        &self,
        message_id: MessageId,
        text: String,
        markup: Markup,
        keyboard: Keyboard,
    ) -> Result<(), ChannelError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(ChannelError::EditFailed("message is gone".to_string()));
        }
        self.recorded.lock().edits.push(Edit {
            message_id,
            text,
            markup,
            keyboard,
        });
        Ok(())
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<(), ChannelError> {
        self.recorded.lock().deleted.push(message_id);
        Ok(())
    }

    async fn answer_action(
        &self,
        action_id: &str,
        text: Option<String>,
    ) -> Result<(), ChannelError> {
        self.recorded
            .lock()
            .answers
            .push((action_id.to_string(), text));
        Ok(())
    }

    async fn download_voice(&self, file_id: &str) -> Result<VoiceFile, ChannelError> {
        self.recorded
            .lock()
            .voice
            .clone()
            .ok_or_else(|| ChannelError::DownloadFailed(format!("no file {file_id}")))
    }
}

/// Transcriber returning a canned result and recording language hints.
#[derive(Clone)]
pub(crate) struct FakeTranscriber {
    result: Option<String>,
    languages: Arc<Mutex<Vec<String>>>,
}

impl FakeTranscriber {
    pub fn ok(text: &str) -> Self {
        Self {
            result: Some(text.to_string()),
            languages: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            languages: Arc::default(),
        }
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().clone()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _clip: AudioClip, language: &str) -> Result<String, SpeechError> {
        self.languages.lock().push(language.to_string());
        self.result
            .clone()
            .ok_or_else(|| SpeechError::Api("upstream 500".to_string()))
    }
}

/// Local HTTP server collecting webhook bodies.
pub(crate) struct CaptureServer {
    addr: SocketAddr,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl CaptureServer {
    pub async fn start() -> Self {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/hook", post(capture))
            .with_state(bodies.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind capture server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("capture server");
        });
        Self { addr, bodies }
    }

    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().clone()
    }

    /// Waits until at least `count` bodies arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<Value> {
        for _ in 0..100 {
            let bodies = self.bodies();
            if bodies.len() >= count {
                return bodies;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {count} webhook calls, got {}", self.bodies().len());
    }
}

async fn capture(State(bodies): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>) {
    bodies.lock().push(body);
}
