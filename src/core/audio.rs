// Audio module - Sound cue collaborator contract
use async_trait::async_trait;
use std::sync::Arc;

/// Plays named sound cues on behalf of a session.
///
/// Playback problems are never errors for the caller: `play` reports whether
/// the cue was heard and the session carries on either way.
#[async_trait]
pub trait AudioCollaborator: Send + Sync {
    /// Play a cue, resolving once playback has ended
    async fn play(&self, cue: &str) -> bool;

    /// Stop whatever is playing right now
    fn stop(&self);
}

pub type SharedAudio = Arc<dyn AudioCollaborator>;

/// Collaborator used when audio is disabled
#[derive(Debug, Default, Clone)]
pub struct SilentAudio;

#[async_trait]
impl AudioCollaborator for SilentAudio {
    async fn play(&self, _cue: &str) -> bool {
        false
    }

    fn stop(&self) {}
}
