//! Keepalive pings.
//!
//! Proxies tend to reap websockets that stay quiet for about a minute, so an
//! attached connection is pinged on a fixed interval. The same loop ends the
//! connection once its session has gone idle, which eventually drains
//! abandoned sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{Connection, ConnectionError, Frame};
use crate::config::SyncConfig;
use crate::protocol::ClientId;
use crate::session::Session;

/// Ping until the session goes idle or a ping cannot be queued. Returns the
/// reason it stopped.
pub(super) async fn run_keepalive(
    session: Arc<Session>,
    connection: Connection,
    client_id: ClientId,
    config: SyncConfig,
) -> ConnectionError {
    let period = config.ping_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let idle = session.last_activity().elapsed();
        if idle >= config.idle_timeout {
            log::info!(
                "Session {} idle for {:?}, closing client {}",
                session.id(),
                idle,
                client_id
            );
            return ConnectionError::Idle(idle);
        }

        if let Err(e) = connection.send(Frame::Ping, config.io_timeout).await {
            log::warn!("Ping error for client {}@{}: {}", client_id, session.id(), e);
            return ConnectionError::Keepalive(e);
        }
        log::debug!("ping {}@{}", client_id, session.id());
    }
}
