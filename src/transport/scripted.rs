//! A scripted, recording transport for tests and offline demos.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::time::Instant;

use super::{HttpRequest, HttpResponse, HttpTransport, TransportError};

type Reply = Result<HttpResponse, TransportError>;

#[derive(Default)]
struct Script {
    /// One-shot replies, consumed in order before routes are consulted.
    queue: VecDeque<Reply>,
    /// Persistent replies keyed by URL path suffix.
    routes: Vec<(String, Reply)>,
    fallback: Option<Reply>,
    requests: Vec<(Instant, HttpRequest)>,
}

/// Transport that answers from a script and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Always answer requests whose path ends with `path` with a JSON body.
    pub fn respond_json(&self, path: &str, status: u16, body: Value) -> &Self {
        self.lock()
            .routes
            .push((path.to_string(), Ok(HttpResponse::json_body(status, &body))));
        self
    }

    /// Always answer requests whose path ends with `path` with a raw body.
    pub fn respond_raw(&self, path: &str, status: u16, body: &str) -> &Self {
        self.lock()
            .routes
            .push((path.to_string(), Ok(HttpResponse::new(status, body))));
        self
    }

    /// Queue a one-shot reply.
    pub fn enqueue(&self, reply: Result<HttpResponse, TransportError>) -> &Self {
        self.lock().queue.push_back(reply);
        self
    }

    /// Fail every otherwise unmatched request with `error`.
    pub fn fail_with(&self, error: TransportError) -> &Self {
        self.lock().fallback = Some(Err(error));
        self
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.iter().map(|(_, r)| r.clone()).collect()
    }

    /// Instants at which each request arrived.
    pub fn call_times(&self) -> Vec<Instant> {
        self.lock().requests.iter().map(|(t, _)| *t).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Requests whose URL path ends with `path`.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|(_, r)| path_of(&r.url).ends_with(path))
            .map(|(_, r)| r.clone())
            .collect()
    }
}

fn path_of(url: &str) -> &str {
    let without_query = url.split('?').next().unwrap_or(url);
    match without_query.find("://") {
        Some(idx) => {
            let rest = &without_query[idx + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        }
        None => without_query,
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.lock();
        script.requests.push((Instant::now(), request.clone()));

        if let Some(reply) = script.queue.pop_front() {
            return reply;
        }

        let path = path_of(&request.url);
        if let Some((_, reply)) = script
            .routes
            .iter()
            .rev()
            .find(|(suffix, _)| path.ends_with(suffix.as_str()))
        {
            return reply.clone();
        }

        match &script.fallback {
            Some(reply) => reply.clone(),
            None => Err(TransportError::Connect(format!(
                "no scripted response for {}",
                request.url
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use serde_json::json;

    fn get(url: &str) -> HttpRequest {
        HttpRequest {
            url: url.to_string(),
            method: Method::Get,
            headers: Vec::new(),
            body: None,
            timeout: None,
            with_credentials: false,
        }
    }

    #[test]
    fn test_path_of() {
        assert_eq!(path_of("https://api.example.com/api/auth/me?x=1"), "/api/auth/me");
        assert_eq!(path_of("https://api.example.com"), "/");
        assert_eq!(path_of("/relative"), "/relative");
    }

    #[tokio::test]
    async fn test_routes_queue_and_recording() {
        let transport = ScriptedTransport::new();
        transport.respond_json("/me", 200, json!({"success": true}));
        transport.enqueue(Err(TransportError::Connect("down".into())));

        assert!(transport.send(get("http://h/me")).await.is_err());
        let resp = transport.send(get("http://h/me")).await.unwrap();
        assert_eq!(resp.status, 200);
        assert!(transport.send(get("http://h/other")).await.is_err());

        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.requests_to("/me").len(), 2);
    }
}
