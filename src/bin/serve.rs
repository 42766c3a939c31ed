//! Development server for the SimpleTS terminal site
//!
//! Serves the static site (index.html, CSS, the wasm-bindgen output) from
//! the current directory with the MIME types browsers insist on.
//!
//! Usage: `serve [port]` (default 8080)

use anyhow::Context;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tiny_http::{Header, Request, Response, Server};

const DEFAULT_PORT: u16 = 8080;

type FileResponse = Response<std::io::Cursor<Vec<u8>>>;

fn main() -> anyhow::Result<()> {
    simplets::logging::init("info");

    let port = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr = format!("0.0.0.0:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("failed to bind {}", addr))?;

    println!("┌─────────────────────────────────────┐");
    println!("│  simplets dev server                │");
    println!("├─────────────────────────────────────┤");
    println!("│  http://localhost:{:<18}│", port);
    println!("└─────────────────────────────────────┘");

    for request in server.incoming_requests() {
        handle(request);
    }
    Ok(())
}

fn handle(request: Request) {
    let url = request.url().to_string();
    let response = match resolve(&url) {
        Some(path) => serve_file(&path),
        None => not_found(),
    };
    tracing::info!(method = %request.method(), url = %url, status = response.status_code().0, "request");
    if let Err(e) = request.respond(response) {
        tracing::warn!(url = %url, "failed to respond: {}", e);
    }
}

/// Map a request URL to a file below the working directory
fn resolve(url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return Some(PathBuf::from("index.html"));
    }
    let path = Path::new(path);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(path.to_path_buf())
}

fn serve_file(path: &Path) -> FileResponse {
    match fs::read(path) {
        Ok(contents) => {
            let response = Response::from_data(contents);
            match content_type(mime_type(path)) {
                Some(header) => response.with_header(header),
                None => response,
            }
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), "not served: {}", e);
            not_found()
        }
    }
}

fn not_found() -> FileResponse {
    let response = Response::from_string("404 Not Found").with_status_code(404);
    match content_type("text/plain; charset=utf-8") {
        Some(header) => response.with_header(header),
        None => response,
    }
}

fn content_type(mime: &str) -> Option<Header> {
    Header::from_bytes("Content-Type", mime).ok()
}

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "application/javascript",
        Some("wasm") => "application/wasm",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("mp3") => "audio/mpeg",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("/"), Some(PathBuf::from("index.html")));
        assert_eq!(resolve("/pkg/simplets.js?v=2"), Some(PathBuf::from("pkg/simplets.js")));
        assert_eq!(resolve("/../secret"), None);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("pkg/simplets_bg.wasm")), "application/wasm");
        assert_eq!(mime_type(Path::new("style.css")), "text/css");
        assert_eq!(mime_type(Path::new("README")), "application/octet-stream");
    }
}
