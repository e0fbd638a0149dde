//! Request and response values routed through the app-shell manager.

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};

/// What kind of resource the caller is loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// Full-page navigation.
    Document,
    Script,
    Style,
    Manifest,
    Image,
    #[default]
    Other,
}

impl Destination {
    /// Best guess from a path, for hosts that do not report a destination.
    pub fn from_path(path: &str) -> Self {
        let ext = path.rsplit('/').next().and_then(|name| name.rsplit_once('.'));
        match ext.map(|(_, ext)| ext) {
            None => Destination::Document,
            Some("html") | Some("htm") => Destination::Document,
            Some("js") | Some("mjs") => Destination::Script,
            Some("css") => Destination::Style,
            Some("json") | Some("webmanifest") => Destination::Manifest,
            Some("png") | Some("svg") | Some("ico") | Some("jpg") | Some("webp") => {
                Destination::Image
            }
            Some(_) => Destination::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellRequest {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl ShellRequest {
    pub fn new(method: Method, url: Url, destination: Destination) -> Self {
        Self {
            method,
            url,
            destination,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: Url, body: impl Into<Vec<u8>>) -> Self {
        Self::new(Method::POST, url, Destination::Other).with_body(body)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn get(url: Url) -> Self {
        let destination = Destination::from_path(url.path());
        Self::new(Method::GET, url, destination)
    }

    /// Resolve `path` against `origin` and build a GET for it.
    pub fn get_path(origin: &Url, path: &str) -> Result<Self> {
        let url = origin
            .join(path)
            .with_context(|| format!("Invalid asset path: {}", path))?;
        Ok(Self::get(url))
    }

    pub fn navigation(url: Url) -> Self {
        Self::new(Method::GET, url, Destination::Document)
    }

    /// Cache identity: the URL without its fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }

    /// Reads only; anything else may have side effects and is never stored.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Built locally because the network could not answer.
    #[serde(default)]
    pub synthetic: bool,
}

impl ShellResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            headers: Vec::new(),
            body: body.into(),
            synthetic: false,
        }
    }

    /// Locally built stand-in for a response the network could not give.
    pub fn offline(message: impl Into<String>) -> Self {
        Self {
            status: 503,
            status_text: "Service Unavailable".to_string(),
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: message.into().into_bytes(),
            synthetic: true,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_from_path() {
        assert_eq!(Destination::from_path("/"), Destination::Document);
        assert_eq!(Destination::from_path("/index.html"), Destination::Document);
        assert_eq!(Destination::from_path("/app/api.js"), Destination::Script);
        assert_eq!(Destination::from_path("/manifest.json"), Destination::Manifest);
        assert_eq!(Destination::from_path("/icons/app.png"), Destination::Image);
        assert_eq!(Destination::from_path("/history"), Destination::Document);
        assert_eq!(Destination::from_path("/font.woff2"), Destination::Other);
    }

    #[test]
    fn test_cache_key_drops_fragment() {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let a = ShellRequest::get_path(&origin, "/index.html#top").unwrap();
        let b = ShellRequest::get_path(&origin, "/index.html").unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(b.cache_key(), "http://localhost:8080/index.html");
    }

    #[test]
    fn test_with_status_fills_reason() {
        let resp = ShellResponse::with_status(404, "");
        assert_eq!(resp.status_text, "Not Found");
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
        assert!(!resp.synthetic);
    }

    #[test]
    fn test_post_carries_headers_and_body() {
        let url = Url::parse("https://script.google.com/macros/s/abc/exec").unwrap();
        let req = ShellRequest::post(url, r#"{"id":"t1"}"#).with_header("content-type", "text/plain");
        assert_eq!(req.method, Method::POST);
        assert!(!req.is_read());
        assert_eq!(req.body.as_deref(), Some(br#"{"id":"t1"}"#.as_slice()));
        assert_eq!(req.headers, vec![("content-type".to_string(), "text/plain".to_string())]);
    }

    #[test]
    fn test_offline_response() {
        let resp = ShellResponse::offline("Offline: Resource not cached.");
        assert_eq!(resp.status, 503);
        assert!(resp.synthetic);
        assert!(!resp.is_success());
        assert_eq!(resp.header("Content-Type"), Some("text/plain; charset=utf-8"));
        assert_eq!(resp.text(), "Offline: Resource not cached.");
    }
}
