//! HTTP response helpers.

use std::io::Read;

use anyhow::{Result, bail};
use tiny_http::{Header, Request, Response, StatusCode};

use super::api::ApiResponse;

/// Largest accepted request body
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Headers attached to every reply
const COMMON_HEADERS: [(&str, &str); 4] = [
    ("Content-Type", "application/json"),
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

/// Read the request body, refusing anything above [`MAX_BODY_BYTES`].
pub fn read_body(request: &mut Request) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)?;
    if body.len() as u64 > MAX_BODY_BYTES {
        bail!("request body exceeds {} bytes", MAX_BODY_BYTES);
    }
    Ok(body)
}

/// Send an [`ApiResponse`] as JSON.
pub fn respond(request: Request, reply: ApiResponse) -> Result<()> {
    let body = match &reply.body {
        Some(value) => serde_json::to_vec(value)?,
        None => Vec::new(),
    };

    let mut response = Response::from_data(body).with_status_code(StatusCode(reply.status));
    for header in common_headers() {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

fn common_headers() -> impl Iterator<Item = Header> {
    COMMON_HEADERS
        .iter()
        .filter_map(|(key, value)| Header::from_bytes(*key, *value).ok())
}
