//! Timing and sizing knobs for connection handling.

use std::time::Duration;

/// How often an attached connection is pinged.
pub const PING_INTERVAL: Duration = Duration::from_secs(10);

/// A connection closes itself once its session has been idle this long.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Upper bound for a single transport write.
pub const IO_TIMEOUT: Duration = Duration::from_secs(1);

/// Hard ceiling on a connection's total lifetime.
pub const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// First value shown by the reveal countdown.
pub const REVEAL_FROM: u32 = 3;

/// Time between countdown steps.
pub const REVEAL_STEP: Duration = Duration::from_secs(1);

/// Frames that may queue for one client before snapshots are dropped.
pub const OUTBOX_CAPACITY: usize = 64;

/// Connection handling configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    pub io_timeout: Duration,
    pub max_connection_lifetime: Duration,
    pub reveal_from: u32,
    pub reveal_step: Duration,
    pub outbox_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ping_interval: PING_INTERVAL,
            idle_timeout: IDLE_TIMEOUT,
            io_timeout: IO_TIMEOUT,
            max_connection_lifetime: MAX_CONNECTION_LIFETIME,
            reveal_from: REVEAL_FROM,
            reveal_step: REVEAL_STEP,
            outbox_capacity: OUTBOX_CAPACITY,
        }
    }
}
