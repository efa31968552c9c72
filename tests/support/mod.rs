#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use devicelink::auth::{AuthBackend, DeviceCodeResponse, FlowError, StartResponse, TokenResponse};
use devicelink::config::Timing;
use devicelink::error::LinkError;

pub const VERIFICATION_URL: &str = "https://trakt.tv/activate";

/// How the scripted backend answers the start request.
#[derive(Debug, Clone, Copy)]
pub enum StartReply {
    AlreadyAuthorized,
    FlowStarted,
    Status(u16),
}

/// Replies handed out in order; the last one repeats forever.
struct Sticky<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T: Clone> Sticky<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    fn replace(&self, items: Vec<T>) {
        *self.items.lock().expect("script lock poisoned") = items.into();
    }

    fn next(&self) -> Option<T> {
        let mut items = self.items.lock().expect("script lock poisoned");
        if items.len() > 1 {
            items.pop_front()
        } else {
            items.front().cloned()
        }
    }
}

/// In-memory [`AuthBackend`] with scripted replies, optional delays and
/// per-endpoint call counters.
pub struct ScriptedBackend {
    start: Sticky<StartReply>,
    device_codes: Sticky<String>,
    tokens: Sticky<String>,
    errors: Sticky<Vec<String>>,
    expires_in: u64,
    start_delay: Duration,
    token_delay: Duration,
    device_code_failures: AtomicUsize,
    token_failures: AtomicUsize,
    error_failures: AtomicUsize,
    start_calls: AtomicUsize,
    device_code_calls: AtomicUsize,
    token_calls: AtomicUsize,
    error_calls: AtomicUsize,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            start: Sticky::new(vec![StartReply::FlowStarted]),
            device_codes: Sticky::new(vec!["ABCD1234".to_string()]),
            tokens: Sticky::new(vec![String::new()]),
            errors: Sticky::new(vec![Vec::new()]),
            expires_in: 600,
            start_delay: Duration::ZERO,
            token_delay: Duration::ZERO,
            device_code_failures: AtomicUsize::new(0),
            token_failures: AtomicUsize::new(0),
            error_failures: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            device_code_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
            error_calls: AtomicUsize::new(0),
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Consume one scripted failure, if any are left.
fn take_failure(remaining: &AtomicUsize, endpoint: &str) -> Result<(), LinkError> {
    match remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
        Ok(_) => Err(LinkError::unexpected_status(endpoint, 503, "scripted outage")),
        Err(_) => Ok(()),
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(self, reply: StartReply) -> Self {
        self.start.replace(vec![reply]);
        self
    }

    pub fn with_device_codes(self, codes: &[&str]) -> Self {
        self.set_device_codes(codes);
        self
    }

    pub fn with_tokens(self, tokens: &[&str]) -> Self {
        self.set_tokens(tokens);
        self
    }

    pub fn with_errors(self, errors: &[&[&str]]) -> Self {
        self.errors
            .replace(errors.iter().map(|batch| owned(batch)).collect());
        self
    }

    pub fn with_expires_in(mut self, secs: u64) -> Self {
        self.expires_in = secs;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// The next `n` device-code calls fail with a 503 before the script resumes.
    pub fn with_device_code_failures(self, n: usize) -> Self {
        self.device_code_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_token_failures(self, n: usize) -> Self {
        self.token_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_error_failures(self, n: usize) -> Self {
        self.error_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn set_device_codes(&self, codes: &[&str]) {
        self.device_codes.replace(owned(codes));
    }

    pub fn set_tokens(&self, tokens: &[&str]) {
        self.tokens.replace(owned(tokens));
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn device_code_calls(&self) -> usize {
        self.device_code_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn error_calls(&self) -> usize {
        self.error_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.start_calls() + self.device_code_calls() + self.token_calls() + self.error_calls()
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn start_authorization(&self) -> Result<StartResponse, LinkError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        match self.start.next().unwrap_or(StartReply::FlowStarted) {
            StartReply::AlreadyAuthorized => Ok(StartResponse::AlreadyAuthorized),
            StartReply::FlowStarted => Ok(StartResponse::FlowStarted),
            StartReply::Status(status) => Err(LinkError::unexpected_status(
                "scripted/authorize",
                status,
                "scripted failure",
            )),
        }
    }

    async fn device_code(&self) -> Result<DeviceCodeResponse, LinkError> {
        self.device_code_calls.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.device_code_failures, "scripted/device-code")?;
        let code = self.device_codes.next().unwrap_or_default();
        Ok(DeviceCodeResponse {
            verification_url: if code.is_empty() {
                String::new()
            } else {
                VERIFICATION_URL.to_string()
            },
            code,
            expires_in: self.expires_in,
        })
    }

    async fn token(&self) -> Result<TokenResponse, LinkError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if !self.token_delay.is_zero() {
            tokio::time::sleep(self.token_delay).await;
        }
        take_failure(&self.token_failures, "scripted/token")?;
        Ok(TokenResponse {
            access_token: self.tokens.next(),
        })
    }

    async fn errors(&self) -> Result<Vec<FlowError>, LinkError> {
        self.error_calls.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.error_failures, "scripted/errors")?;
        Ok(self
            .errors
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(FlowError::new)
            .collect())
    }
}

/// Poll device codes every 2s (10s ceiling) and tokens every 3s.
pub fn reference_timing() -> Timing {
    Timing::default()
}
