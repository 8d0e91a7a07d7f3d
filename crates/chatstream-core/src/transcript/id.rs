//! Message identity

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Unique message id: issue time plus a per-session sequence number.
///
/// The sequence number alone guarantees uniqueness, so two ids minted in
/// the same millisecond still differ. Ordering follows issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    issued_at_ms: i64,
    seq: u64,
}

impl MessageId {
    pub fn issued_at_ms(&self) -> i64 {
        self.issued_at_ms
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.issued_at_ms, self.seq)
    }
}

/// Issues monotonically increasing ids for one session
#[derive(Debug, Default)]
pub struct IdMinter {
    last_ms: i64,
    next_seq: u64,
}

impl IdMinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self) -> MessageId {
        self.mint_at(Utc::now().timestamp_millis())
    }

    /// Mint using an explicit clock reading. A clock that steps backwards
    /// is clamped so ids never go back in time.
    pub fn mint_at(&mut self, now_ms: i64) -> MessageId {
        self.last_ms = self.last_ms.max(now_ms);
        let id = MessageId {
            issued_at_ms: self.last_ms,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        id
    }
}
