//! Incremental HTTP/1.1 request parser
//!
//! Fungsi murni: `(bytes terkumpul, request parsial) -> hasil`.
//! Head (request line + headers) di-parse per baris dengan delimiter CRLF
//! setelah baris kosong ditemukan. Body dibatasi `Content-Length`; jika bytes
//! belum cukup, head yang sudah di-parse disimpan sebagai [`PartialRequest`]
//! dan bytes body dikembalikan sebagai leftover sampai data berikutnya datang.
//! Bytes setelah body adalah awal request berikutnya (pipelining).
//!
//! Head yang belum lengkap juga disimpan sebagai [`PartialRequest`] berisi
//! posisi scan terakhir, supaya pencarian baris kosong dilanjutkan dan tidak
//! diulang dari awal. Head lebih besar dari [`MAX_HEAD_SIZE`] ditolak.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use thiserror::Error;

use super::request::{Method, Request};

const CRLF: &[u8] = b"\r\n";
const HEAD_END: &[u8] = b"\r\n\r\n";

/// Ukuran maksimum request line + headers, termasuk baris kosong penutup
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Errors yang membuat posisi parse tidak bisa dipulihkan
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request line tidak terdiri dari tepat tiga token dipisah spasi
    #[error("malformed request line: {0:?}")]
    RequestLine(String),

    /// Head bukan UTF-8 valid
    #[error("request head is not valid UTF-8")]
    Encoding,

    /// `Content-Length` negatif, non-numerik, atau ambigu
    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    /// Head melebihi [`MAX_HEAD_SIZE`] (jumlah bytes yang sudah diterima)
    #[error("request head too large: {0} bytes")]
    HeadTooLarge(usize),
}

/// Request yang belum lengkap. Disimpan per koneksi di antara parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRequest {
    stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    /// Baris kosong belum ditemukan di `scanned` bytes pertama
    Head { scanned: usize },
    /// Head sudah lengkap, body belum
    Body {
        request: Request,
        content_length: usize,
    },
}

impl PartialRequest {
    /// Jumlah bytes body yang dideklarasikan, `None` selama head belum lengkap
    pub fn content_length(&self) -> Option<usize> {
        match &self.stage {
            Stage::Head { .. } => None,
            Stage::Body { content_length, .. } => Some(*content_length),
        }
    }
}

/// Hasil satu parse attempt
#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
    /// Request lengkap. `leftover` milik request berikutnya.
    Complete { request: Request, leftover: Vec<u8> },
    /// Data belum cukup. `leftover` harus dikembalikan ke inbound dan
    /// `partial` diberikan lagi pada attempt berikutnya.
    Incomplete {
        partial: Option<PartialRequest>,
        leftover: Vec<u8>,
    },
}

/// Parse bytes yang terkumpul untuk satu koneksi.
///
/// Hasilnya sama untuk data yang sama, berapapun ukuran chunk saat data
/// diterima, selama leftover dan partial dikembalikan setiap kali.
pub fn parse(data: Vec<u8>, partial: Option<PartialRequest>) -> Result<Parsed, ParseError> {
    let scanned = match partial.map(|p| p.stage) {
        None => 0,
        Some(Stage::Head { scanned }) => scanned,
        Some(Stage::Body {
            request,
            content_length,
        }) => return Ok(parse_body(request, content_length, data)),
    };

    let (request, body_start) = match parse_head(&data, scanned)? {
        Some(head) => head,
        None => {
            if data.len() > MAX_HEAD_SIZE {
                return Err(ParseError::HeadTooLarge(data.len()));
            }
            return Ok(Parsed::Incomplete {
                partial: Some(PartialRequest {
                    stage: Stage::Head {
                        scanned: data.len(),
                    },
                }),
                leftover: data,
            });
        }
    };

    let content_length = request.content_length()?;
    let mut data = data;
    let body = data.split_off(body_start);
    Ok(parse_body(request, content_length, body))
}

fn parse_body(mut request: Request, content_length: usize, mut data: Vec<u8>) -> Parsed {
    if data.len() < content_length {
        return Parsed::Incomplete {
            partial: Some(PartialRequest {
                stage: Stage::Body {
                    request,
                    content_length,
                },
            }),
            leftover: data,
        };
    }

    let leftover = data.split_off(content_length);
    request.body = data;
    Parsed::Complete { request, leftover }
}

/// Returns request (tanpa body) dan offset awal body, atau `None` jika
/// baris kosong penutup head belum diterima. `scanned` bytes pertama sudah
/// dicari pada attempt sebelumnya.
fn parse_head(data: &[u8], scanned: usize) -> Result<Option<(Request, usize)>, ParseError> {
    // Baris kosong sebelum request line diabaikan (sisa CRLF antar request)
    let mut begin = 0;
    while data[begin..].starts_with(CRLF) {
        begin += CRLF.len();
    }

    // Request line tanpa header: "GET / HTTP/1.1\r\n\r\n"
    // Delimiter bisa terpotong di batas chunk, mundur 3 bytes
    let from = scanned.saturating_sub(HEAD_END.len() - 1).max(begin);
    let head_end = match find(data, HEAD_END, from) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    if head_end + HEAD_END.len() > MAX_HEAD_SIZE {
        return Err(ParseError::HeadTooLarge(head_end + HEAD_END.len()));
    }

    let head = std::str::from_utf8(&data[begin..head_end]).map_err(|_| ParseError::Encoding)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut request = parse_request_line(request_line)?;

    for line in lines {
        parse_header_line(line, &mut request.headers);
    }

    Ok(Some((request, head_end + HEAD_END.len())))
}

/// `METHOD SP URI SP VERSION`
fn parse_request_line(line: &str) -> Result<Request, ParseError> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(ParseError::RequestLine(line.to_string()));
    }

    let mut request = Request::new(Method::parse(parts[0]), parts[1], parts[2]);
    let (path, query) = parse_uri(parts[1]);
    request.uri = path;
    request.query = query;
    Ok(request)
}

/// Path di-decode sampai `?`; sisanya dipecah `&` lalu `=`.
/// Segmen tanpa tepat satu `=` dilewati.
pub fn parse_uri(uri: &str) -> (String, HashMap<String, String>) {
    let mut query = HashMap::new();
    let (path, query_line) = match uri.split_once('?') {
        Some((path, rest)) => (path, rest),
        None => return (percent_decode(uri), query),
    };

    for pair in query_line.split('&') {
        let kv: Vec<&str> = pair.split('=').collect();
        if kv.len() != 2 {
            continue;
        }
        query.insert(percent_decode(kv[0].trim()), percent_decode(kv[1].trim()));
    }

    (percent_decode(path), query)
}

/// `KEY ":" SPACE* VALUE`. Baris tanpa `:` dilewati, bukan error.
fn parse_header_line(line: &str, headers: &mut HashMap<String, String>) {
    if let Some((key, value)) = line.split_once(':') {
        headers.insert(percent_decode(key.trim()), percent_decode(value.trim()));
    }
}

/// Percent-decode (`%XX`). `+` tidak diubah jadi spasi. Sequence yang
/// menghasilkan UTF-8 tidak valid diganti U+FFFD.
pub fn percent_decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}
