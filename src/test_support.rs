use crate::fetcher::{decode_document, FetchError, StatusSource};
use crate::notifier::{NotifyError, Notifier};
use crate::status::RawDocument;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub fn document(json: &str) -> RawDocument {
    let mut body = json.as_bytes().to_vec();
    decode_document(&mut body).expect("test document")
}

/// Serves queued fetch results in order; an empty queue is a decode failure.
#[derive(Default)]
pub struct FakeSource {
    queue: Mutex<VecDeque<Result<RawDocument, FetchError>>>,
}

impl FakeSource {
    pub fn push(&self, result: Result<RawDocument, FetchError>) {
        self.queue.lock().expect("fake source lock").push_back(result);
    }

    pub fn push_json(&self, json: &str) {
        self.push(Ok(document(json)));
    }

    pub fn push_failure(&self) {
        self.push(Err(FetchError::Decode("unavailable".to_string())));
    }
}

impl StatusSource for FakeSource {
    async fn fetch(&self) -> Result<RawDocument, FetchError> {
        self.queue
            .lock()
            .expect("fake source lock")
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Decode("queue empty".to_string())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { text: String, rich: bool },
    Image(Vec<u8>),
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("notifier lock").clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { text, .. } => Some(text),
                Sent::Image(_) => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Api {
                method: "sendMessage",
                description: "simulated outage".to_string(),
            });
        }
        self.sent.lock().expect("notifier lock").push(sent);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str, rich: bool) -> Result<(), NotifyError> {
        self.record(Sent::Text {
            text: text.to_string(),
            rich,
        })
    }

    async fn send_image(&self, image: Vec<u8>) -> Result<(), NotifyError> {
        self.record(Sent::Image(image))
    }
}
