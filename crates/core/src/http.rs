//! Request and response snapshots.
//!
//! These are the values exchanged between the engine, the network and the
//! cache tiers. A [`Request`] is built fresh for every intercepted request and
//! never persisted; a [`Response`] is what gets stored inside a tier.

use std::convert::Infallible;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of resource the client expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Style,
    Script,
    Image,
    Font,
    #[default]
    Empty,
    Other,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Empty => "empty",
            Destination::Other => "other",
        }
    }
}

impl FromStr for Destination {
    type Err = Infallible;

    /// Unknown kinds map to [`Destination::Other`]; an empty string is `Empty`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "style" => Destination::Style,
            "script" => Destination::Script,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "" | "empty" => Destination::Empty,
            _ => Destination::Other,
        })
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub url: Url,
    /// Upper-cased HTTP method.
    pub method: String,
    pub destination: Destination,
    /// Set for top-level page navigations.
    pub navigate: bool,
    pub accept: Option<String>,
    /// Payload forwarded untouched for mutating requests.
    pub body: Option<Bytes>,
}

impl Request {
    /// A plain `GET` with an empty destination.
    pub fn get(url: Url) -> Self {
        Self { url, method: "GET".into(), destination: Destination::Empty, navigate: false, accept: None, body: None }
    }

    /// A top-level page navigation.
    pub fn navigation(url: Url) -> Self {
        Self {
            destination: Destination::Document,
            navigate: true,
            accept: Some("text/html,application/xhtml+xml".into()),
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.trim().to_ascii_uppercase();
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Whether the `Accept` header asks for JSON.
    pub fn accepts_json(&self) -> bool {
        self.accept
            .as_deref()
            .is_some_and(|accept| accept.to_ascii_lowercase().contains("application/json"))
    }
}

/// A captured response: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the response was produced for.
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { url: url.into(), status, headers, body: body.into() }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup, first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}
