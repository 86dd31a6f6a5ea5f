//! Request and response values seen by callers

use crate::error::ClientError;
use crate::transport::HttpMethod;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One logical API call, relative to the configured base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Method
    pub method: HttpMethod,
    /// Resource path, e.g. `segments/web/production`
    pub path: String,
    /// JSON body
    pub body: Option<Value>,
    /// Human-readable description used in logs
    pub action: String,
}

impl ApiRequest {
    fn new(method: HttpMethod, path: impl Into<String>, body: Option<Value>) -> Self {
        let path = path.into();
        let action = format!("{method} {path}");
        Self {
            method,
            path,
            body,
            action,
        }
    }

    /// `GET path`
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path, None)
    }

    /// `POST path` with a JSON body
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path, Some(body))
    }

    /// `PATCH path` with a JSON body
    #[must_use]
    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, path, Some(body))
    }

    /// Replace the log description
    #[must_use]
    pub fn describe(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }
}

/// Terminal response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    path: String,
    body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) fn new(status: u16, path: String, body: Vec<u8>) -> Self {
        Self { status, path, body }
    }

    /// Status code
    #[inline]
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Any 2xx
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Raw body
    #[inline]
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as lossy UTF-8, for logging rejected requests
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body
    ///
    /// # Errors
    /// Returns [`ClientError::Decode`] if the body is not the expected JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Decode {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}
