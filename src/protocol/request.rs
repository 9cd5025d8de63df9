use std::collections::HashMap;
use std::fmt;

use super::parser::ParseError;

/// HTTP request methods.
///
/// Route handler hanya melayani GET dan POST; method lain tetap di-parse
/// supaya service bisa menjawab 400.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    /// Token method lain, disimpan apa adanya
    Other(String),
}

impl Method {
    /// Parse method token (case-sensitive, seperti di wire).
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Other(s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parsed HTTP request.
///
/// Parser hanya mengeluarkan request yang sudah lengkap (head + body sesuai
/// `Content-Length`), jadi handler tidak pernah melihat request setengah jadi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path yang sudah di-percent-decode, tanpa query string
    pub uri: String,
    /// URI asli dari request line, termasuk query string
    pub raw_uri: String,
    pub version: String,
    /// Key case-sensitive seperti diterima; duplikat: yang terakhir menang
    pub headers: HashMap<String, String>,
    /// Query parameters; duplikat: yang terakhir menang
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub(crate) fn new(method: Method, raw_uri: &str, version: &str) -> Self {
        Self {
            method,
            uri: String::new(),
            raw_uri: raw_uri.to_string(),
            version: version.to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Header lookup dengan key persis seperti diterima
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Header lookup case-insensitive.
    ///
    /// Jika ada beberapa variasi huruf dari key yang sama, yang dipilih adalah
    /// yang cocok persis, lalu yang pertama secara leksikografis.
    pub fn header_ignore_case(&self, key: &str) -> Option<&str> {
        if let Some(v) = self.header(key) {
            return Some(v);
        }
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(|v| v.as_str())
    }

    /// Panjang body yang dideklarasikan. Header tidak ada berarti 0.
    ///
    /// # Errors
    /// `InvalidContentLength` untuk nilai negatif, non-numerik, atau beberapa
    /// variasi huruf header dengan nilai berbeda.
    pub fn content_length(&self) -> Result<usize, ParseError> {
        let mut found: Option<&str> = None;
        for (key, value) in &self.headers {
            if !key.eq_ignore_ascii_case("content-length") {
                continue;
            }
            match found {
                Some(prev) if prev.trim() != value.trim() => {
                    return Err(ParseError::InvalidContentLength(value.clone()));
                }
                _ => found = Some(value),
            }
        }

        match found {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength(raw.to_string())),
        }
    }

    /// Apakah koneksi boleh tetap terbuka setelah response.
    ///
    /// HTTP/1.1 default keep-alive kecuali `Connection: close`.
    /// HTTP/1.0 default close kecuali `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let connection = self.header_ignore_case("Connection");
        if self.version.eq_ignore_ascii_case("HTTP/1.0") {
            connection
                .map(|v| v.eq_ignore_ascii_case("keep-alive"))
                .unwrap_or(false)
        } else {
            connection
                .map(|v| !v.eq_ignore_ascii_case("close"))
                .unwrap_or(true)
        }
    }
}
