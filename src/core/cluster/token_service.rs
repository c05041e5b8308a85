use super::{acquire_cluster_token, get_cluster_rule};
use std::fmt;

/// The status of a token request answered by a token service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// admitted
    Ok,
    /// admitted after sleeping `wait_ms`
    ShouldWait,
    /// the server knows no rule for the flow id
    NoRuleExists,
    /// malformed request
    BadRequest,
    /// the server itself sheds the request
    TooManyRequest,
    /// denied by the rule
    Blocked,
    /// server-side failure
    Fail,
}

/// The result of a token request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTokenResult {
    pub status: TokenStatus,
    /// tokens left below the threshold after this acquisition
    pub remaining: i64,
    pub wait_ms: u64,
}

impl ClusterTokenResult {
    pub fn new(status: TokenStatus) -> Self {
        ClusterTokenResult {
            status,
            remaining: 0,
            wait_ms: 0,
        }
    }

    pub fn ok(remaining: i64) -> Self {
        ClusterTokenResult {
            status: TokenStatus::Ok,
            remaining,
            wait_ms: 0,
        }
    }

    pub fn should_wait(wait_ms: u64) -> Self {
        ClusterTokenResult {
            status: TokenStatus::ShouldWait,
            remaining: 0,
            wait_ms,
        }
    }

    pub fn blocked() -> Self {
        Self::new(TokenStatus::Blocked)
    }
}

impl fmt::Display for ClusterTokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClusterTokenResult{{status={:?}, remaining={}, waitMs={}}}",
            self.status, self.remaining, self.wait_ms
        )
    }
}

/// The token acquisition contract a flow rule in cluster mode delegates to.
/// Implementations are the in-process embedded server, or a client speaking
/// to a remote one.
pub trait TokenService: Send + Sync {
    fn request_token(
        &self,
        flow_id: u64,
        acquire_count: u32,
        prioritized: bool,
    ) -> ClusterTokenResult;
}

/// The embedded token server: answers token requests from the rules and
/// metrics registered in this process.
#[derive(Default)]
pub struct DefaultTokenService {}

impl DefaultTokenService {
    pub fn new() -> Self {
        DefaultTokenService {}
    }
}

impl TokenService for DefaultTokenService {
    fn request_token(
        &self,
        flow_id: u64,
        acquire_count: u32,
        prioritized: bool,
    ) -> ClusterTokenResult {
        if flow_id == 0 || acquire_count == 0 {
            return ClusterTokenResult::new(TokenStatus::BadRequest);
        }
        let rule = match get_cluster_rule(flow_id) {
            Some(rule) => rule,
            None => return ClusterTokenResult::new(TokenStatus::NoRuleExists),
        };
        acquire_cluster_token(&rule, acquire_count, prioritized)
    }
}
