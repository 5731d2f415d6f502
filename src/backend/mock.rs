use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{Backend, BackendCallOutcome};
use crate::protocol::BackendChatRequest;

/// What the mock answers to a chat call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Fixed outcome for every call.
    Fixed(BackendCallOutcome<String>),
    /// Success whose text is `"echo: " + last message content`.
    Echo,
}

/// In-memory backend with scripted replies, call counting and optional latency.
pub struct MockBackend {
    reply: Mutex<MockReply>,
    models: Mutex<BackendCallOutcome<serde_json::Value>>,
    delay: Duration,
    chat_calls: AtomicUsize,
    last_request: Mutex<Option<BackendChatRequest>>,
}

impl MockBackend {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            models: Mutex::new(BackendCallOutcome::Success(json!({"models": []}))),
            delay: Duration::ZERO,
            chat_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(MockReply::Fixed(BackendCallOutcome::Success(text.to_string())))
    }

    pub fn failing(outcome: BackendCallOutcome<String>) -> Self {
        Self::new(MockReply::Fixed(outcome))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_models(self, outcome: BackendCallOutcome<serde_json::Value>) -> Self {
        *self.models.lock().unwrap() = outcome;
        self
    }

    pub fn set_reply(&self, reply: MockReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<BackendChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn base_url(&self) -> &str {
        "http://mock.invalid"
    }

    async fn chat(&self, request: &BackendChatRequest) -> BackendCallOutcome<String> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            MockReply::Fixed(outcome) => outcome,
            MockReply::Echo => {
                let last = request
                    .messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                BackendCallOutcome::Success(format!("echo: {last}"))
            }
        }
    }

    async fn list_models(&self) -> BackendCallOutcome<serde_json::Value> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.models.lock().unwrap().clone()
    }

    async fn status(&self) -> BackendCallOutcome<()> {
        self.list_models().await.map(|_| ())
    }
}
