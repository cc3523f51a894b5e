/// Self-echo detection for pushes.
///
/// Every push is stamped with a fresh token that travels in
/// `settings.lastMutationId`. When a change notification arrives carrying a
/// token this session issued, it is our own write coming back. All
/// outstanding tokens are remembered, so the echo of an older push is still
/// recognised after a newer one has been issued. Only the echo of the latest
/// push describes what the remote row ends up holding.
/// A token is consumed when matched. TTL and the cap are cleanup only.
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::ids;

const TOKEN_TTL: Duration = Duration::from_secs(120);
const MAX_OUTSTANDING: usize = 64;

struct PendingToken {
    token: String,
    issued_at: Instant,
}

/// How an incoming token relates to the writes this session issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoMatch {
    /// Not one of ours.
    Foreign,
    /// Ours, but a newer write of ours is queued behind it.
    Superseded,
    /// Ours, and the most recent token issued.
    Latest,
}

pub struct MutationEchoGuard {
    /// Oldest first.
    pending: VecDeque<PendingToken>,
    last_issued: Option<String>,
}

impl MutationEchoGuard {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            last_issued: None,
        }
    }

    /// Issue and remember a token for an outgoing write.
    pub fn issue(&mut self) -> String {
        self.cleanup_expired();
        let token = ids::mutation_token();
        self.pending.push_back(PendingToken {
            token: token.clone(),
            issued_at: Instant::now(),
        });
        while self.pending.len() > MAX_OUTSTANDING {
            self.pending.pop_front();
        }
        self.last_issued = Some(token.clone());
        token
    }

    /// Classify an incoming notification. A match consumes the token.
    pub fn match_echo(&mut self, incoming: &str) -> EchoMatch {
        if incoming.is_empty() {
            return EchoMatch::Foreign;
        }
        let Some(pos) = self.pending.iter().position(|p| p.token == incoming) else {
            return EchoMatch::Foreign;
        };
        self.pending.remove(pos);
        if self.last_issued.as_deref() == Some(incoming) {
            EchoMatch::Latest
        } else {
            EchoMatch::Superseded
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Forget everything, e.g. when switching boards.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_issued = None;
    }

    pub fn cleanup_expired(&mut self) {
        let now = Instant::now();
        self.pending
            .retain(|p| now.duration_since(p.issued_at) < TOKEN_TTL);
    }
}

impl Default for MutationEchoGuard {
    fn default() -> Self {
        Self::new()
    }
}
