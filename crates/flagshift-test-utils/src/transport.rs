use crate::relative_path;
use async_trait::async_trait;
use flagshift_client::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

type Key = (HttpMethod, String);

/// Transport answering from a script
///
/// Lookup order per request: queued one-shot responses, then sticky
/// responses, then the fallback status with body `{}`.
#[derive(Debug)]
pub struct ScriptedTransport {
    queued: Mutex<HashMap<Key, VecDeque<Result<HttpResponse, TransportError>>>>,
    sticky: Mutex<HashMap<Key, HttpResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    fallback: u16,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Unscripted requests get `200 {}`
    pub fn new() -> Self {
        Self::with_fallback(200)
    }

    pub fn with_fallback(status: u16) -> Self {
        Self {
            queued: Mutex::new(HashMap::new()),
            sticky: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            fallback: status,
        }
    }

    /// Answer the next matching request once
    pub fn enqueue(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.queued
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Ok(response));
    }

    /// Fail the next matching request once
    pub fn enqueue_error(&self, method: HttpMethod, path: &str, error: TransportError) {
        self.queued
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Err(error));
    }

    /// Answer every matching request
    pub fn always(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.sticky.lock().insert((method, path.to_string()), response);
    }

    /// Answer with a JSON document once
    pub fn enqueue_json(&self, method: HttpMethod, path: &str, status: u16, body: &Value) {
        self.enqueue(method, path, HttpResponse::new(status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    /// Paths of every request, in order, formatted as `METHOD path`
    pub fn log(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = relative_path(&request.url);
        let body = request
            .body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok());
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            path: path.clone(),
            headers: request.headers,
            body,
        });

        let key = (request.method, path);
        if let Some(next) = self.queued.lock().get_mut(&key).and_then(VecDeque::pop_front) {
            return next;
        }
        if let Some(response) = self.sticky.lock().get(&key) {
            return Ok(response.clone());
        }
        Ok(HttpResponse::new(self.fallback, "{}"))
    }
}
