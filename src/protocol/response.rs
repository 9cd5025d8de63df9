use std::fmt;

/// Status yang dipakai HTTP service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    NotFound,
}

impl StatusCode {
    #[inline(always)]
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
        }
    }
}

/// `"404 Not Found"`, bagian status line setelah version
impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

pub const HTTP_VERSION: &str = "HTTP/1.1";
pub const CONTENT_TYPE: &str = "text/html;charset=utf-8";

/// HTTP response. Header disimpan berurutan supaya output deterministik.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Response dengan default headers (`Content-Type`, `Connection: keep-alive`)
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![
                ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
                ("Connection".to_string(), "keep-alive".to_string()),
            ],
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::Ok, body)
    }

    /// Body tetap `404 Not Found`
    pub fn not_found() -> Self {
        let status = StatusCode::NotFound;
        Self::new(status, status.to_string())
    }

    /// Body tetap `400 Bad Request`
    pub fn bad_request() -> Self {
        let status = StatusCode::BadRequest;
        Self::new(status, status.to_string())
    }

    /// Set header; key yang sama (case-insensitive) ditimpa.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        set_header(&mut self.headers, key, value);
        self
    }

    /// Serialize ke wire format HTTP/1.1
    pub fn to_bytes(&self) -> Vec<u8> {
        format_response(
            HTTP_VERSION,
            &self.status.to_string(),
            &self.headers,
            &self.body,
        )
    }
}

/// `VERSION SP STATUS CRLF (key:value CRLF)* CRLF body`.
///
/// `Content-Length` selalu di-inject atau ditimpa sesuai panjang body.
pub fn format_response(
    version: &str,
    status: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Vec<u8> {
    let mut headers = headers.to_vec();
    set_header(&mut headers, "Content-Length", &body.len().to_string());

    let mut head = String::with_capacity(64 + headers.len() * 32);
    head.push_str(version);
    head.push(' ');
    head.push_str(status);
    head.push_str("\r\n");
    for (key, value) in &headers {
        head.push_str(key);
        head.push(':');
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    let mut out = Vec::with_capacity(head.len() + body.len());
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(body);
    out
}

fn set_header(headers: &mut Vec<(String, String)>, key: &str, value: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    headers.push((key.to_string(), value.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_status_line() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
        assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    }

    #[test]
    fn test_ok_response_layout() {
        let out = text(&Response::ok("hello GET").to_bytes());
        assert_eq!(
            out,
            "HTTP/1.1 200 OK\r\n\
             Content-Type:text/html;charset=utf-8\r\n\
             Connection:keep-alive\r\n\
             Content-Length:9\r\n\
             \r\n\
             hello GET"
        );
    }

    #[test]
    fn test_content_length_is_overwritten() {
        let headers = vec![("content-length".to_string(), "999".to_string())];
        let out = text(&format_response("HTTP/1.1", "200 OK", &headers, b"abc"));
        assert!(out.contains("Content-Length:3\r\n"));
        assert!(!out.contains("999"));
    }

    #[test]
    fn test_fixed_error_bodies() {
        let not_found = Response::not_found();
        assert_eq!(not_found.body, b"404 Not Found".to_vec());
        assert_eq!(Response::bad_request().body, b"400 Bad Request".to_vec());
    }

    #[test]
    fn test_header_replaces_existing() {
        let resp = Response::ok("").header("connection", "close");
        let connection: Vec<_> = resp
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("connection"))
            .collect();
        assert_eq!(connection.len(), 1);
        assert_eq!(connection[0].1, "close");
    }

    #[test]
    fn test_empty_body() {
        let out = text(&format_response("HTTP/1.1", "200 OK", &[], b""));
        assert_eq!(out, "HTTP/1.1 200 OK\r\nContent-Length:0\r\n\r\n");
    }
}
