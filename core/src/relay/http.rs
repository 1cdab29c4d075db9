//! HTTP/1.1 request framing and status-line parsing
//!
//! Only what one `POST` with `Connection: close` needs: no chunked bodies,
//! no redirects, no keep-alive.

use core::fmt::{self, Write};

use crate::settings::Endpoint;

/// Write the request line and headers for a JSON `POST`
pub fn write_request<W: Write>(
    out: &mut W,
    endpoint: &Endpoint,
    source_id: &str,
    api_key: &str,
    content_length: usize,
) -> fmt::Result {
    write!(out, "POST {}?source=", endpoint.path.as_str())?;
    write_query_component(out, source_id)?;
    out.write_str(" HTTP/1.1\r\n")?;

    let default_port = if endpoint.secure { 443 } else { 80 };
    if endpoint.port == default_port {
        write!(out, "Host: {}\r\n", endpoint.host.as_str())?;
    } else {
        write!(out, "Host: {}:{}\r\n", endpoint.host.as_str(), endpoint.port)?;
    }

    write!(out, "X-API-KEY: {}\r\n", api_key)?;
    out.write_str("Content-Type: application/json\r\n")?;
    write!(out, "Content-Length: {}\r\n", content_length)?;
    out.write_str("Connection: close\r\n\r\n")
}

/// Percent-encode everything but RFC 3986 unreserved characters
fn write_query_component<W: Write>(out: &mut W, value: &str) -> fmt::Result {
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.write_char(char::from(b))?
            }
            _ => write!(out, "%{:02X}", b)?,
        }
    }
    Ok(())
}

/// Status code from the first line of a response, e.g. `HTTP/1.1 201 Created`
pub fn parse_status(head: &[u8]) -> Option<u16> {
    let line_end = head.windows(2).position(|w| w == b"\r\n")?;
    let line = core::str::from_utf8(&head[..line_end]).ok()?;

    let mut parts = line.splitn(3, ' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code.parse().ok().filter(|c| (100..600).contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    #[test]
    fn test_request_head() {
        let endpoint = Endpoint::parse("https://logs.example/ingest").unwrap();
        let mut out: String<512> = String::new();
        write_request(&mut out, &endpoint, "src-1", "abc123", 42).unwrap();
        assert_eq!(
            out.as_str(),
            "POST /ingest?source=src-1 HTTP/1.1\r\n\
             Host: logs.example\r\n\
             X-API-KEY: abc123\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 42\r\n\
             Connection: close\r\n\r\n"
        );
    }

    #[test]
    fn test_request_head_custom_port_and_encoding() {
        let endpoint = Endpoint::parse("http://10.0.0.2:4000/api/logs").unwrap();
        let mut out: String<512> = String::new();
        write_request(&mut out, &endpoint, "a b&c", "k", 0).unwrap();
        assert!(out.starts_with("POST /api/logs?source=a%20b%26c HTTP/1.1\r\n"));
        assert!(out.contains("\r\nHost: 10.0.0.2:4000\r\n"));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(b"HTTP/1.1 201 Created\r\n"), Some(201));
        assert_eq!(parse_status(b"HTTP/1.0 401 Unauthorized\r\nx: y\r\n\r\n"), Some(401));
        assert_eq!(parse_status(b"HTTP/1.1 200\r\n"), Some(200));
    }

    #[test]
    fn test_parse_status_rejects_garbage() {
        assert_eq!(parse_status(b""), None);
        assert_eq!(parse_status(b"HTTP/1.1 201 Created"), None); // no line end
        assert_eq!(parse_status(b"SSH-2.0-OpenSSH\r\n"), None);
        assert_eq!(parse_status(b"HTTP/1.1 2O1 OK\r\n"), None);
        assert_eq!(parse_status(b"HTTP/1.1 999 Nope\r\n"), None);
    }
}
