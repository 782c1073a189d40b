//! Scripted fetcher that never touches the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use racefeed_core::{FetchError, Fetcher};

/// What the fake provider answers for one request.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Denied,
    Fail,
}

/// Replies are keyed by the request with base URL and credential stripped,
/// e.g. `sectionals.ashx?Sharecode=04202403011430`. Unscripted requests fail.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, request: &str, body: impl Into<String>) {
        self.script(request, Reply::Body(body.into()));
    }

    pub fn script(&self, request: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(request.to_string(), reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// `https://host/TPD/client/points.ashx?Sharecode=X&k=secret` -> `points.ashx?Sharecode=X`
pub fn request_of(url: &str) -> String {
    let tail = url.rsplit_once('/').map(|(_, tail)| tail).unwrap_or(url);
    tail.split("&k=").next().unwrap_or(tail).to_string()
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let request = request_of(url);
        self.requests.lock().unwrap().push(request.clone());

        let reply = self.replies.lock().unwrap().get(&request).cloned();
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Denied) => Err(FetchError::PermissionDenied),
            Some(Reply::Fail) | None => Err(FetchError::Exhausted {
                attempts: 3,
                reason: format!("no scripted reply for {}", request),
            }),
        }
    }
}
