//! The outbound port every device call goes through.
//!
//! Core logic only speaks [`DeviceTransport`]; the reqwest adapter lives in
//! [`crate::network::http`] and tests plug in scripted or simulated devices.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    Multipart {
        field: String,
        file_name: String,
        bytes: Arc<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub endpoint: SocketAddr,
    pub method: Method,
    /// Path plus query string; this is also the digest `uri`.
    pub path: String,
    pub body: RequestBody,
    pub authorization: Option<String>,
    pub timeout: Duration,
}

impl DeviceRequest {
    pub fn get(endpoint: SocketAddr, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint,
            method: Method::Get,
            path: path.into(),
            body: RequestBody::Empty,
            authorization: None,
            timeout,
        }
    }

    pub fn post_form(
        endpoint: SocketAddr,
        path: impl Into<String>,
        form: Vec<(String, String)>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            method: Method::Post,
            path: path.into(),
            body: RequestBody::Form(form),
            authorization: None,
            timeout,
        }
    }

    pub fn post_multipart(
        endpoint: SocketAddr,
        path: impl Into<String>,
        field: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Arc<Vec<u8>>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            method: Method::Post,
            path: path.into(),
            body: RequestBody::Multipart {
                field: field.into(),
                file_name: file_name.into(),
                bytes,
            },
            authorization: None,
            timeout,
        }
    }

    /// Looks up a submitted form field.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceResponse {
    pub status: u16,
    /// Every `WWW-Authenticate` header, in order.
    pub www_authenticate: Vec<String>,
    pub server: Option<String>,
    pub body: String,
}

impl DeviceResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Whether a TCP connection to `addr` opens within `timeout`.
    async fn is_reachable(&self, addr: SocketAddr, timeout: Duration) -> bool;

    async fn execute(&self, request: DeviceRequest) -> Result<DeviceResponse, TransportError>;
}
