//! Connection lifecycle state machine.
//!
//! ```text
//! STOPPED      -> CONNECTING   start()
//! DISCONNECTED -> CONNECTING   start()
//! CONNECTING   -> CONNECTED    transport open
//! CONNECTING   -> DISCONNECTED transport failure/close before open
//! CONNECTED    -> STOPPING     stop()
//! CONNECTED    -> DISCONNECTED transport close/failure
//! STOPPING     -> DISCONNECTED transport close/failure
//! *            -> CLOSED       close()
//! ```
//!
//! Every transition is a compare-and-swap; callers act on the CAS result, never on a
//! separate read.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectivityState {
    /// Created, never started (or start not yet attempted).
    Stopped = 0,
    /// Outbound connect in flight.
    Connecting = 1,
    /// Handshake completed; sends are accepted.
    Connected = 2,
    /// The socket went away; `start()` may be called again.
    Disconnected = 3,
    /// A clean shutdown was requested and the peer's close is pending.
    Stopping = 4,
    /// Terminal. The session can no longer be used.
    Closed = 5,
}

impl ConnectivityState {
    /// All states, in discriminant order.
    pub const ALL: [ConnectivityState; 6] = [
        Self::Stopped,
        Self::Connecting,
        Self::Connected,
        Self::Disconnected,
        Self::Stopping,
        Self::Closed,
    ];

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Stopped,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnected,
            4 => Self::Stopping,
            _ => Self::Closed,
        }
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: ConnectivityState) -> bool {
        use ConnectivityState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Stopped | Disconnected, Connecting) => true,
            (Connecting, Connected | Disconnected) => true,
            (Connected, Stopping | Disconnected) => true,
            (Stopping, Disconnected) => true,
            _ => false,
        }
    }

    /// Whether `start()` is accepted from this state.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Stopped | Self::Disconnected)
    }

    /// Upper-case protocol name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Stopping => "STOPPING",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically updated [`ConnectivityState`].
#[derive(Debug)]
pub struct AtomicConnectivityState {
    inner: AtomicU8,
}

impl Default for AtomicConnectivityState {
    fn default() -> Self {
        Self::new(ConnectivityState::Stopped)
    }
}

impl AtomicConnectivityState {
    /// Create a new state cell.
    pub fn new(initial: ConnectivityState) -> Self {
        Self { inner: AtomicU8::new(initial as u8) }
    }

    /// Current state.
    pub fn load(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Move from `expected` to `new`. Returns true only for the caller that performed it.
    pub fn compare_and_set(&self, expected: ConnectivityState, new: ConnectivityState) -> bool {
        self.inner
            .compare_exchange(expected as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to `new` from any state in `expected`.
    ///
    /// Returns `Ok(previous)` when this caller performed the transition, or `Err(observed)`
    /// with the state that prevented it.
    pub fn transition_from(
        &self,
        expected: &[ConnectivityState],
        new: ConnectivityState,
    ) -> Result<ConnectivityState, ConnectivityState> {
        self.inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let current = ConnectivityState::from_u8(raw);
                expected.contains(&current).then_some(new as u8)
            })
            .map(ConnectivityState::from_u8)
            .map_err(ConnectivityState::from_u8)
    }

    /// Move to [`ConnectivityState::Closed`] from whatever state is current.
    ///
    /// Returns the state that was replaced (`Closed` if it was already closed).
    pub fn close(&self) -> ConnectivityState {
        match self.transition_from(
            &[
                ConnectivityState::Stopped,
                ConnectivityState::Connecting,
                ConnectivityState::Connected,
                ConnectivityState::Disconnected,
                ConnectivityState::Stopping,
            ],
            ConnectivityState::Closed,
        ) {
            Ok(previous) => previous,
            Err(observed) => observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectivityState::*;

    #[test]
    fn test_legal_edges() {
        let legal = [
            (Stopped, Connecting),
            (Disconnected, Connecting),
            (Connecting, Connected),
            (Connecting, Disconnected),
            (Connected, Stopping),
            (Connected, Disconnected),
            (Stopping, Disconnected),
        ];
        for from in ConnectivityState::ALL {
            for to in ConnectivityState::ALL {
                let expected = legal.contains(&(from, to)) || (from != Closed && to == Closed);
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_compare_and_set_only_succeeds_once() {
        let state = AtomicConnectivityState::default();
        assert!(state.compare_and_set(Stopped, Connecting));
        assert!(!state.compare_and_set(Stopped, Connecting));
        assert_eq!(state.load(), Connecting);
    }

    #[test]
    fn test_transition_from_reports_observed_state() {
        let state = AtomicConnectivityState::new(Stopping);
        assert_eq!(state.transition_from(&[Stopped, Disconnected], Connecting), Err(Stopping));
        assert_eq!(state.transition_from(&[Connected, Stopping], Disconnected), Ok(Stopping));
        assert_eq!(state.load(), Disconnected);
    }

    #[test]
    fn test_close_from_any_state() {
        for initial in ConnectivityState::ALL {
            let state = AtomicConnectivityState::new(initial);
            assert_eq!(state.close(), initial);
            assert_eq!(state.load(), Closed);
        }
    }

    #[test]
    fn test_display_names() {
        let names: Vec<String> = ConnectivityState::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            ["STOPPED", "CONNECTING", "CONNECTED", "DISCONNECTED", "STOPPING", "CLOSED"]
        );
    }
}
