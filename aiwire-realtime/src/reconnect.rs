//! Opt-in reconnection with capped exponential backoff.
//!
//! Sessions never reconnect by themselves. Callers that want to survive dropped connections
//! call [`reconnect`] from their [`on_disconnect`](crate::ServerEventHandler::on_disconnect)
//! path or a supervisor task.

use crate::error::{RealtimeError, Result};
use crate::session::RealtimeSession;
use crate::state::ConnectivityState;
use std::time::Duration;

/// How [`reconnect`] retries.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum number of connect attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// How long to wait for each attempt to settle.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1).min(63) as i32);
        let nanos = (self.initial_backoff.as_nanos() as f64 * factor)
            .min(self.max_backoff.as_nanos() as f64);
        Duration::from_nanos(nanos as u64)
    }
}

/// Bring `session` back to `CONNECTED`.
///
/// Returns the attempt number that succeeded (`1` if the first did, or if the session was
/// already connected). Gives up immediately if the session is closed, otherwise after
/// `policy.max_attempts` failures with the last error.
pub async fn reconnect(session: &RealtimeSession, policy: &ReconnectPolicy) -> Result<u32> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let error = match connect_once(session, policy.connect_timeout).await {
            Ok(()) => {
                tracing::info!(session_id = session.session_id(), attempt, "reconnected");
                return Ok(attempt);
            }
            Err(RealtimeError::SessionClosed) => return Err(RealtimeError::SessionClosed),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            tracing::error!(
                session_id = session.session_id(),
                attempts = attempt,
                error = %error,
                "giving up reconnecting"
            );
            return Err(error);
        }

        let delay = policy.backoff(attempt);
        tracing::warn!(
            session_id = session.session_id(),
            attempt,
            max_attempts,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "reconnect attempt failed"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

async fn connect_once(session: &RealtimeSession, timeout: Duration) -> Result<()> {
    match session.start() {
        Ok(()) => {}
        // Someone else is already connecting or stopping; wait for that to settle.
        Err(RealtimeError::InvalidState { state, .. }) if state != ConnectivityState::Connected => {}
        Err(RealtimeError::InvalidState { .. }) => return Ok(()),
        Err(e) => return Err(e),
    }
    match session.wait_until_settled(timeout).await? {
        ConnectivityState::Connected => Ok(()),
        ConnectivityState::Closed => Err(RealtimeError::SessionClosed),
        other => Err(RealtimeError::connection(format!("connect attempt ended {other}"))),
    }
}
