//! Scripted network used by tests.
//!
//! Replies are keyed by absolute URL and stay in place until replaced.
//! Unscripted URLs fail like an unreachable host.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use offgrid_core::{Error, Request, Response, ResponseSource};

use super::Fetcher;

#[derive(Debug, Clone)]
enum Reply {
    Respond { status: u16, body: Bytes, delay: Duration },
    Fail(String),
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    seen: Mutex<Vec<Request>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        self.respond_after(url, Duration::ZERO, status, body);
    }

    pub(crate) fn respond_after(&self, url: &str, delay: Duration, status: u16, body: &str) {
        let reply = Reply::Respond { status, body: Bytes::from(body.to_string()), delay };
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    pub(crate) fn fail(&self, url: &str, reason: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Fail(reason.to_string()));
    }

    /// Total number of fetches issued.
    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Number of fetches issued for one URL.
    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|r| r.url.as_str() == url).count()
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.seen.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();

        match reply {
            Some(Reply::Respond { status, body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(Response::new(status, body, ResponseSource::Network))
            }
            Some(Reply::Fail(reason)) => Err(Error::Network(reason)),
            None => Err(Error::Network(format!("no route to {}", request.url))),
        }
    }
}
