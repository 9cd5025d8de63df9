//! HTTP service: routing table di atas `Handler`
//!
//! `on_receive` mengambil inbound, mem-parse sebanyak mungkin request lengkap
//! (pipelining), lalu menaruh response di outbound. Sisa bytes dan head yang
//! belum lengkap disimpan untuk task berikutnya.

use std::collections::HashMap;
use std::sync::Arc;

use mio::Token;
use tracing::{debug, info, warn};

use super::parser::{parse, Parsed, PartialRequest};
use super::request::{Method, Request};
use super::response::Response;
use crate::core::Registry;
use crate::error::Result;
use crate::network::Handler;

/// Handler untuk satu path. Nilai kembalian menjadi body response 200.
pub trait Resource: Send + Sync + 'static {
    fn get(&self, request: &Request) -> Vec<u8> {
        let _ = request;
        Vec::new()
    }

    fn post(&self, request: &Request) -> Vec<u8> {
        let _ = request;
        Vec::new()
    }
}

/// State parse per koneksi, disimpan di `Connection` di antara task
#[derive(Debug, Default)]
struct Session {
    partial: Option<PartialRequest>,
    close_after_send: bool,
}

/// Routing table `path -> Resource`
#[derive(Clone, Default)]
pub struct HttpService {
    routes: HashMap<String, Arc<dyn Resource>>,
}

impl HttpService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`HttpService::register`]
    pub fn route(mut self, path: impl Into<String>, resource: impl Resource) -> Self {
        self.register(path, resource);
        self
    }

    /// Daftarkan resource untuk path (sudah di-decode, tanpa query).
    /// Path yang sama ditimpa.
    pub fn register(&mut self, path: impl Into<String>, resource: impl Resource) {
        self.routes.insert(path.into(), Arc::new(resource));
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(|k| k.as_str())
    }

    /// Path tidak terdaftar: 404. GET/POST: 200 dengan body dari resource.
    /// Method lain: 400.
    pub fn respond(&self, request: &Request) -> Response {
        let Some(resource) = self.routes.get(&request.uri) else {
            return Response::not_found();
        };

        match request.method {
            Method::Get => Response::ok(resource.get(request)),
            Method::Post => Response::ok(resource.post(request)),
            _ => Response::bad_request(),
        }
    }

    fn load(registry: &Registry, token: Token) -> Session {
        registry.take_state::<Session>(token).unwrap_or_default()
    }
}

impl Handler for HttpService {
    fn on_receive(&self, registry: &Registry, token: Token) -> Result<()> {
        let mut session = Self::load(registry, token);

        // Response terakhir akan menutup koneksi, input berikutnya dibuang
        if session.close_after_send {
            let _ = registry.pop_received(token);
            registry.put_state(token, session);
            return Ok(());
        }

        let Some(mut data) = registry.pop_received(token) else {
            return Ok(());
        };
        let peer = registry.peer_addr(token);

        loop {
            match parse(data, session.partial.take()) {
                Ok(Parsed::Complete { request, leftover }) => {
                    if matches!(request.method, Method::Get | Method::Post) {
                        info!(
                            peer = ?peer,
                            method = %request.method,
                            uri = %request.raw_uri,
                            "request"
                        );
                    }

                    let mut response = self.respond(&request);
                    if !request.keep_alive() {
                        response = response.header("Connection", "close");
                        session.close_after_send = true;
                    }
                    if !registry.enqueue(token, &response.to_bytes()) {
                        // Koneksi sudah di-evict
                        return Ok(());
                    }

                    if session.close_after_send || leftover.is_empty() {
                        break;
                    }
                    data = leftover;
                }
                Ok(Parsed::Incomplete { partial, leftover }) => {
                    session.partial = partial;
                    registry.restore_received(token, leftover);
                    break;
                }
                Err(e) => {
                    warn!(token = token.0, peer = ?peer, error = %e, "malformed request");
                    let response = Response::bad_request().header("Connection", "close");
                    registry.enqueue(token, &response.to_bytes());
                    session.close_after_send = true;
                    break;
                }
            }
        }

        registry.put_state(token, session);
        Ok(())
    }

    fn on_send(&self, registry: &Registry, token: Token) -> Result<()> {
        let Some(session) = registry.take_state::<Session>(token) else {
            return Ok(());
        };

        if session.close_after_send && !registry.has_pending_output(token) {
            debug!(token = token.0, "response flushed, closing connection");
            registry.remove(token);
        } else {
            registry.put_state(token, session);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hello;

    impl Resource for Hello {
        fn get(&self, _request: &Request) -> Vec<u8> {
            b"hello GET".to_vec()
        }

        fn post(&self, request: &Request) -> Vec<u8> {
            let mut body = b"hello POST ".to_vec();
            body.extend_from_slice(&request.body);
            body
        }
    }

    fn request(method: Method, uri: &str) -> Request {
        let mut req = Request::new(method, uri, "HTTP/1.1");
        req.uri = uri.to_string();
        req
    }

    fn service() -> HttpService {
        HttpService::new().route("/test", Hello)
    }

    #[test]
    fn test_get_and_post_dispatch() {
        let svc = service();

        let resp = svc.respond(&request(Method::Get, "/test"));
        assert_eq!(resp.status.as_u16(), 200);
        assert_eq!(resp.body, b"hello GET".to_vec());

        let mut post = request(Method::Post, "/test");
        post.body = b"x".to_vec();
        assert_eq!(svc.respond(&post).body, b"hello POST x".to_vec());
    }

    #[test]
    fn test_unknown_path_is_404() {
        let resp = service().respond(&request(Method::Get, "/missing"));
        assert_eq!(resp.status.as_u16(), 404);
        assert_eq!(resp.body, b"404 Not Found".to_vec());
    }

    #[test]
    fn test_other_methods_are_400() {
        for method in [Method::Put, Method::Delete, Method::Other("BREW".into())] {
            let resp = service().respond(&request(method, "/test"));
            assert_eq!(resp.status.as_u16(), 400);
            assert_eq!(resp.body, b"400 Bad Request".to_vec());
        }
    }

    #[test]
    fn test_default_resource_bodies_are_empty() {
        struct Empty;
        impl Resource for Empty {}

        let svc = HttpService::new().route("/e", Empty);
        assert!(svc.respond(&request(Method::Get, "/e")).body.is_empty());
        assert_eq!(svc.routes().collect::<Vec<_>>(), vec!["/e"]);
    }
}
