//! Minimal HTTP/1.1 request parsing and static file serving for the
//! document root (§6) — one `BufReader` over the accepted stream, read
//! until the blank line, no keep-alive, no chunked bodies. A dashboard is
//! a handful of static assets plus the WebSocket endpoint; nothing here
//! needs to be a general-purpose web server.
use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_websocket_upgrade(&self) -> bool {
        self.header("upgrade")
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
            && self
                .header("connection")
                .map(|v| v.to_ascii_lowercase().contains("upgrade"))
                .unwrap_or(false)
    }
}

pub fn parse_request<R: Read>(stream: &mut R) -> io::Result<HttpRequest> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty request line"))?
        .to_string();
    let path = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing request path"))?
        .to_string();

    let mut headers = BTreeMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    Ok(HttpRequest { method, path, headers })
}

fn status_line(code: u16) -> &'static str {
    match code {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        _ => "HTTP/1.1 500 Internal Server Error",
    }
}

pub fn write_response(stream: &mut TcpStream, code: u16, content_type: &str, body: &[u8]) -> io::Result<()> {
    write!(
        stream,
        "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status_line(code),
        content_type,
        body.len()
    )?;
    stream.write_all(body)
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Resolves a request path against the document root, rejecting any attempt
/// to escape it via `..` components — the only access control an
/// unauthenticated static file server needs.
pub fn resolve_path(doc_root: &Path, request_path: &str) -> Option<PathBuf> {
    let clean = request_path.split('?').next().unwrap_or(request_path);
    let relative = clean.trim_start_matches('/');
    let relative = if relative.is_empty() { "index.html" } else { relative };
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(doc_root.join(relative))
}

pub fn serve_static(stream: &mut TcpStream, doc_root: &Path, request: &HttpRequest) -> io::Result<()> {
    let Some(path) = resolve_path(doc_root, &request.path) else {
        return write_response(stream, 400, "text/plain", b"bad path");
    };
    match std::fs::read(&path) {
        Ok(body) => write_response(stream, 200, content_type_for(&path), &body),
        Err(_) => write_response(stream, 404, "text/plain", b"not found"),
    }
}
