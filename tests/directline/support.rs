//! Shared test doubles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use directline::directline::transport::DirectLineRequest;
use directline::directline::{DirectLineClient, Transport, TransportError};

/// Transport that replays canned replies and records every request.
///
/// Each call suspends a few times before answering, so overlapping callers
/// show up in [`ScriptedTransport::peak_in_flight`].
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    requests: Mutex<Vec<DirectLineRequest>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    /// Transport answering each call with the next body, in order.
    pub fn with_bodies(bodies: &[&str]) -> Arc<Self> {
        let transport = Self::default();
        for body in bodies {
            transport.push_reply(Ok((*body).to_owned()));
        }
        Arc::new(transport)
    }

    /// Queue one more reply.
    pub fn push_reply(&self, reply: Result<String, TransportError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Number of `execute` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were inside `execute` at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Copies of every request received.
    pub fn requests(&self) -> Vec<DirectLineRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(err) => panic!("request log poisoned: {err}"),
        }
    }

    /// The most recent request.
    pub fn last_request(&self) -> DirectLineRequest {
        match self.requests().pop() {
            Some(request) => request,
            None => panic!("no request was recorded"),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: DirectLineRequest) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = match self.replies.lock() {
            Ok(mut replies) => replies.pop_front(),
            Err(_) => None,
        };
        next.unwrap_or_else(|| Ok(String::new()))
    }
}

/// Client wired to `transport` and initialized with `secret`.
pub fn ready_client(transport: &Arc<ScriptedTransport>, secret: &str) -> Arc<DirectLineClient> {
    let client = DirectLineClient::new(Arc::clone(transport) as Arc<dyn Transport>);
    let init = client.initialize(secret);
    assert!(init.is_ok());
    Arc::new(client)
}
