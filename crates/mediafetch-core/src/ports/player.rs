//! Remote player port.
//!
//! The engine only asks whether something is already playing; what to do
//! with a finished file (play it, or just announce it) is decided by the
//! caller that consumes `ReadyToPlay` events.

use async_trait::async_trait;

/// Port for querying a remote media player.
#[async_trait]
pub trait PlayerPort: Send + Sync {
    /// Whether the player is currently playing something.
    ///
    /// Implementations report `false` when the player cannot be reached.
    async fn is_playing(&self) -> bool;
}

/// A player that is never playing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPlayer;

#[async_trait]
impl PlayerPort for NoopPlayer {
    async fn is_playing(&self) -> bool {
        false
    }
}
