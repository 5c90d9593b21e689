/// Lifecycle of the main call within one room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    Connecting,
    Negotiating,
    Connected,
    Closed,
}

impl CallPhase {
    /// `connect()` may start a call from here.
    pub fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Connecting)
    }
}

/// Result of a track toggle on the main call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    On,
    Off,
    /// Capture was refused; nothing changed.
    Denied,
}
