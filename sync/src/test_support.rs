//! Scripted in-memory transport for tests.
//!
//! Routes are plain paths (`/api/health`) or a path plus selection key
//! (`/api/risk-score?ip=maplestory`); the keyed route wins when both exist.
//! One-shot replies queued with [`ScriptedTransport::enqueue`] are served
//! before the route's default reply. Unknown routes answer HTTP 404.

use crate::fetch::{FetchFailure, FetchRequest, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// One canned reply.
#[derive(Debug, Clone)]
pub struct Scripted {
    reply: Result<Value, FetchFailure>,
    delay: Duration,
}

impl Scripted {
    pub fn ok(value: Value) -> Self {
        Self {
            reply: Ok(value),
            delay: Duration::ZERO,
        }
    }

    pub fn fail(failure: FetchFailure) -> Self {
        Self {
            reply: Err(failure),
            delay: Duration::ZERO,
        }
    }

    /// Settle only after `delay` (tokio time, so paused clocks apply).
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<String, VecDeque<Scripted>>,
    defaults: HashMap<String, Scripted>,
    calls: Vec<FetchRequest>,
}

impl Script {
    fn next_reply(&mut self, route: &str) -> Option<Scripted> {
        if let Some(reply) = self.queued.get_mut(route).and_then(VecDeque::pop_front) {
            return Some(reply);
        }
        self.defaults.get(route).cloned()
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default success reply for `route`.
    pub fn respond(&self, route: &str, value: Value) {
        self.set_default(route, Scripted::ok(value));
    }

    /// Default failure reply for `route`.
    pub fn fail(&self, route: &str, failure: FetchFailure) {
        self.set_default(route, Scripted::fail(failure));
    }

    pub fn set_default(&self, route: &str, reply: Scripted) {
        self.lock().defaults.insert(route.to_string(), reply);
    }

    /// Queue a one-shot reply, served before the default.
    pub fn enqueue(&self, route: &str, reply: Scripted) {
        self.lock()
            .queued
            .entry(route.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.path == path).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &FetchRequest) -> Result<Value, FetchFailure> {
        let reply = {
            let mut script = self.lock();
            script.calls.push(request.clone());
            let keyed = request
                .query_value("ip")
                .map(|key| format!("{}?ip={key}", request.path));
            keyed
                .and_then(|route| script.next_reply(&route))
                .or_else(|| script.next_reply(&request.path))
        };

        let Some(Scripted { reply, delay }) = reply else {
            return Err(FetchFailure::http(404));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}
