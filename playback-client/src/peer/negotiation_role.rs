use playback_core::ConnId;

/// Glare tie-break between two connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    /// Keeps its own offer when offers cross.
    Proposer,
    /// Rolls back its own offer and answers the remote one.
    Waiter,
}

impl NegotiationRole {
    /// The lexicographically smaller identifier proposes. Both sides compute
    /// the same answer from the same pair.
    pub fn between(local: &ConnId, remote: &ConnId) -> Self {
        if local < remote {
            Self::Proposer
        } else {
            Self::Waiter
        }
    }
}
