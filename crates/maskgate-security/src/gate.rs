//! The security gate: blocklist, credential presence, abuse heuristics
//!
//! Evaluation order per request, first terminal outcome wins:
//! 1. blocklisted caller → rejected
//! 2. missing credential outside the exempt paths → rejected
//! 3. suspicious activity (rapid requests, denylisted user agent or path) →
//!    rejected and the caller is blocklisted for the process lifetime
//! 4. allowed; the request is logged and stamped with a correlation id

use std::collections::{HashSet, VecDeque};

use aho_corasick::AhoCorasick;
use maskgate_core::{Error, Result};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// Paths reachable without a credential
pub const EXEMPT_PATHS: &[&str] = &["/health", "/proxy/status", "/"];

/// User-agent substrings that mark automated scraping traffic
const SUSPICIOUS_AGENTS: &[&str] = &["bot", "crawler", "spider", "scraper"];

/// Path substrings probing for admin or configuration surfaces
const SUSPICIOUS_PATHS: &[&str] = &["/admin", "/config", "/.env", "/wp-admin"];

/// Ring-buffer capacity for recent request metadata
const REQUEST_LOG_CAPACITY: usize = 1000;

/// Rapid-request threshold: more than this many entries per caller in the
/// trailing minute flips the suspicious heuristic
const RAPID_REQUEST_LIMIT: usize = 100;

const MINUTE_MS: u64 = 60_000;

/// Correlation-id length in hex characters
const REQUEST_ID_LEN: usize = 16;

/// Metadata the gate needs about one inbound request
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Caller identifier (client IP)
    pub caller: String,
    pub method: String,
    pub path: String,
    pub user_agent: String,
    /// Extracted credential, if any; presence-only validation here, real
    /// verification belongs to the external credential store
    pub credential: Option<String>,
}

/// One entry in the bounded request log
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub timestamp_ms: u64,
    pub caller: String,
    pub method: String,
    pub path: String,
    pub user_agent: String,
    pub has_credential: bool,
}

/// The gate owns all per-caller security state. Blocklist and request log
/// each sit behind their own lock; evaluation never suspends, so no lock is
/// held across I/O.
pub struct SecurityGate {
    blocklist: Mutex<HashSet<String>>,
    request_log: Mutex<VecDeque<RequestLogEntry>>,
    agent_denylist: AhoCorasick,
    path_denylist: AhoCorasick,
}

impl SecurityGate {
    pub fn new() -> Result<Self> {
        Ok(Self {
            blocklist: Mutex::new(HashSet::new()),
            request_log: Mutex::new(VecDeque::with_capacity(REQUEST_LOG_CAPACITY)),
            agent_denylist: build_denylist(SUSPICIOUS_AGENTS)?,
            path_denylist: build_denylist(SUSPICIOUS_PATHS)?,
        })
    }

    /// Evaluate one request at the current wall clock
    pub fn evaluate(&self, request: &RequestInfo) -> Result<String> {
        self.evaluate_at(request, now_ms())
    }

    /// Evaluate one request at `now_ms`, returning the correlation id on
    /// admission.
    pub fn evaluate_at(&self, request: &RequestInfo, now_ms: u64) -> Result<String> {
        if self.is_blocked(&request.caller) {
            tracing::warn!(caller = %request.caller, "rejected blocklisted caller");
            return Err(Error::blocked("IP address blocked"));
        }

        let has_credential = request
            .credential
            .as_deref()
            .map_or(false, |c| !c.is_empty());
        if !has_credential && !EXEMPT_PATHS.contains(&request.path.as_str()) {
            tracing::debug!(path = %request.path, "rejected request without credential");
            return Err(Error::Unauthorized);
        }

        if self.is_suspicious(request, now_ms) {
            self.block(&request.caller);
            tracing::warn!(
                caller = %request.caller,
                path = %request.path,
                "suspicious activity, caller blocklisted"
            );
            return Err(Error::blocked("suspicious activity detected"));
        }

        self.log_request(request, has_credential, now_ms);
        Ok(request_id(&request.caller, now_ms, &request.user_agent))
    }

    /// Whether a caller identifier is currently blocklisted
    pub fn is_blocked(&self, caller: &str) -> bool {
        self.blocklist.lock().contains(caller)
    }

    /// Add a caller identifier to the blocklist
    pub fn block(&self, caller: &str) {
        self.blocklist.lock().insert(caller.to_string());
    }

    /// Remove a caller identifier. The gate never calls this itself; it
    /// exists for the external administrative surface only.
    pub fn unblock(&self, caller: &str) {
        self.blocklist.lock().remove(caller);
    }

    /// Number of blocklisted callers
    pub fn blocked_count(&self) -> usize {
        self.blocklist.lock().len()
    }

    /// Number of entries currently held in the request log
    pub fn logged_count(&self) -> usize {
        self.request_log.lock().len()
    }

    fn is_suspicious(&self, request: &RequestInfo, now_ms: u64) -> bool {
        let minute_cutoff = now_ms.saturating_sub(MINUTE_MS);
        // full scan rather than a back-to-front take_while: the log is not
        // sorted by timestamp when the clock steps backwards
        let rapid = {
            let log = self.request_log.lock();
            log.iter()
                .filter(|e| e.timestamp_ms > minute_cutoff && e.caller == request.caller)
                .count()
        };
        if rapid > RAPID_REQUEST_LIMIT {
            return true;
        }

        if self
            .agent_denylist
            .is_match(request.user_agent.to_ascii_lowercase().as_str())
        {
            return true;
        }

        self.path_denylist
            .is_match(request.path.to_ascii_lowercase().as_str())
    }

    fn log_request(&self, request: &RequestInfo, has_credential: bool, now_ms: u64) {
        let mut log = self.request_log.lock();
        if log.len() == REQUEST_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(RequestLogEntry {
            timestamp_ms: now_ms,
            caller: request.caller.clone(),
            method: request.method.clone(),
            path: request.path.clone(),
            user_agent: request.user_agent.clone(),
            has_credential,
        });
    }
}

fn build_denylist(needles: &[&str]) -> Result<AhoCorasick> {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(needles)
        .map_err(|e| Error::pattern(format!("failed to build denylist: {e}")))
}

/// Deterministic per-request correlation id: a short SHA-256 digest over
/// caller, timestamp, and user agent.
fn request_id(caller: &str, now_ms: u64, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(caller.as_bytes());
    hasher.update(b":");
    hasher.update(now_ms.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(user_agent.as_bytes());
    let digest = hasher.finalize();

    let mut id = String::with_capacity(REQUEST_ID_LEN);
    for byte in digest.iter().take(REQUEST_ID_LEN / 2) {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
