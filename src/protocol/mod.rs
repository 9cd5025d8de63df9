//! Protocol Layer: HTTP/1.1 subset di atas reactor
//!
//! - `parser`: bytes -> `Request`, incremental, mendukung pipelining
//! - `response`: `Response` -> bytes, `Content-Length` selalu dihitung ulang
//! - `service`: routing `path -> Resource` sebagai `Handler`

mod parser;
mod request;
mod response;
mod service;

pub use parser::{
    parse, parse_uri, percent_decode, ParseError, Parsed, PartialRequest, MAX_HEAD_SIZE,
};
pub use request::{Method, Request};
pub use response::{format_response, Response, StatusCode, CONTENT_TYPE, HTTP_VERSION};
pub use service::{HttpService, Resource};
