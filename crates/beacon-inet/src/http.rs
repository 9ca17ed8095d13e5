//! Generic outbound HTTP request helper.
//!
//! Toolbox features are synchronous and may be invoked from inside an axum
//! handler (already on a tokio runtime) or from a plain thread.
//! [`fetch_blocking`] therefore runs the request on a dedicated thread with
//! its own single-threaded runtime instead of calling `block_on` in place.

use std::time::Duration;

use tracing::debug;

use crate::InetError;

/// Default read timeout when a request does not specify one.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Properties of an outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Read timeout for the response in seconds.
    pub timeout_secs: u64,
    /// HTTP method.
    pub method: reqwest::Method,
    /// Content type header sent with a body.
    pub content_type: String,
    /// Optional request body.
    pub body: Option<String>,
    /// Additional request headers.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            method: reqwest::Method::GET,
            content_type: "application/x-www-form-urlencoded; charset=UTF-8".to_string(),
            body: None,
            headers: Vec::new(),
        }
    }
}

impl HttpRequest {
    /// A GET request with the given timeout.
    pub fn get(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..Self::default()
        }
    }

    /// A POST request carrying a body, with the given timeout.
    pub fn post(timeout_secs: u64, body: impl Into<String>) -> Self {
        Self {
            timeout_secs,
            method: reqwest::Method::POST,
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// An HTTP response body with its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx status into an error carrying the body.
    pub fn non_2xx_to_error(&self) -> Result<(), InetError> {
        if self.status / 100 == 2 {
            Ok(())
        } else {
            Err(InetError::BadStatus {
                status: self.status,
                body: self.text(),
            })
        }
    }
}

/// Send an HTTP request and read the entire response body.
pub async fn fetch(req: HttpRequest, url: &str) -> Result<HttpResponse, InetError> {
    debug!(method = %req.method, url, "outbound HTTP request");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(req.timeout_secs.max(1)))
        .build()?;

    let mut builder = client.request(req.method.clone(), url);
    for (name, value) in &req.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = req.body {
        builder = builder
            .header(reqwest::header::CONTENT_TYPE, req.content_type.as_str())
            .body(body);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();
    Ok(HttpResponse { status, body })
}

/// Send an HTTP request from synchronous code.
///
/// The request runs on a dedicated thread with its own current-thread
/// runtime, so this is safe to call whether or not the caller is already
/// inside a tokio runtime.
pub fn fetch_blocking(req: HttpRequest, url: &str) -> Result<HttpResponse, InetError> {
    let url = url.to_string();
    let handle = std::thread::spawn(move || -> Result<HttpResponse, InetError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InetError::Other(format!("failed to build HTTP runtime: {e}")))?;
        rt.block_on(fetch(req, &url))
    });
    handle
        .join()
        .map_err(|_| InetError::Other("HTTP worker thread panicked".to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let req = HttpRequest::default();
        assert_eq!(req.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(req.method, reqwest::Method::GET);
        assert!(req.body.is_none());
    }

    #[test]
    fn non_2xx_is_an_error() {
        let ok = HttpResponse {
            status: 204,
            body: Vec::new(),
        };
        assert!(ok.non_2xx_to_error().is_ok());

        let not_found = HttpResponse {
            status: 404,
            body: b"missing".to_vec(),
        };
        let err = not_found.non_2xx_to_error().unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn response_text_is_lossy() {
        let resp = HttpResponse {
            status: 200,
            body: vec![b'o', b'k', 0xFF],
        };
        assert!(resp.text().starts_with("ok"));
    }
}
