//! Reveal countdown.
//!
//! Counts `from, from-1, .., 1` in the world's `countdown` field, one step
//! apart, then sets `countdown = 0` together with the requested value. Every
//! step is broadcast.
//!
//! A reset that lands mid-countdown is not coordinated with it: whichever
//! write comes last wins.

use std::sync::Arc;
use std::time::Duration;

use crate::protocol::{Value, COUNTDOWN_KEY};
use crate::session::Session;

/// Run a countdown on `session`, finishing with `world[key] = value`.
pub async fn run_reveal(session: Arc<Session>, key: String, value: Value, from: u32, step: Duration) {
    for n in (1..=from).rev() {
        session.update_world(COUNTDOWN_KEY, n);
        session.broadcast();
        tokio::time::sleep(step).await;
    }
    session.update_world(COUNTDOWN_KEY, 0);
    session.update_world(key, value);
    session.broadcast();
}
