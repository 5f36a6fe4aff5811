//! Deterministic substitutes for requests neither network nor cache can serve.

use swtier_core::{Destination, Request, Response};

/// Literal body message of the offline JSON response.
pub const OFFLINE_MESSAGE: &str = "You are currently offline. Please check your connection and try again.";

/// Body of the stylesheet/script substitute; valid in both languages.
pub const OFFLINE_ASSET_BODY: &str = "/* Offline fallback */";

/// 1x1 transparent RGBA PNG.
pub const TRANSPARENT_PNG: [u8; 67] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49,
    0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// What to serve when everything else failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// The pre-cached offline page; resolved from the cache by the caller.
    OfflinePage,
    /// The cached placeholder image, or [`transparent_png`] when absent.
    Placeholder,
    Synthesized(Response),
    /// No substitute exists; the original error propagates.
    None,
}

/// Pick the substitute for a failed request.
///
/// Precedence: navigation, JSON-accepting, image, style, script.
pub fn for_request(request: &Request) -> Fallback {
    let url = request.url.as_str();
    if request.navigate {
        return Fallback::OfflinePage;
    }
    if request.accepts_json() {
        return Fallback::Synthesized(offline_json(url));
    }
    match request.destination {
        Destination::Image => Fallback::Placeholder,
        Destination::Style => Fallback::Synthesized(offline_asset(url, "text/css")),
        Destination::Script => Fallback::Synthesized(offline_asset(url, "application/javascript")),
        _ => Fallback::None,
    }
}

pub fn offline_json(url: &str) -> Response {
    let body = serde_json::json!({ "error": OFFLINE_MESSAGE }).to_string();
    Response::new(url, 503, vec![("Content-Type".into(), "application/json".into())], body)
}

fn offline_asset(url: &str, content_type: &str) -> Response {
    Response::new(url, 200, vec![("Content-Type".into(), content_type.into())], OFFLINE_ASSET_BODY)
}

pub fn transparent_png(url: &str) -> Response {
    Response::new(url, 200, vec![("Content-Type".into(), "image/png".into())], TRANSPARENT_PNG.to_vec())
}
