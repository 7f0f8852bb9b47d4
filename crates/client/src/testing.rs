//! Scripted network for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use shellcache_core::{Error, Request, Response};

use crate::fetch::Fetcher;

/// Serves canned responses by URL and counts every fetch.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, response: Response) -> Self {
        self.set_route(url, response);
        self
    }

    pub fn set_route(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        *self.calls.lock().unwrap().entry(url.clone()).or_default() += 1;

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }

        match self.routes.lock().unwrap().get(&url) {
            Some(response) => Ok(response.clone()),
            None => Err(Error::Network(format!("connection refused: {url}"))),
        }
    }
}
