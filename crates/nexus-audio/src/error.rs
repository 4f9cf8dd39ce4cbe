use nexus_ecs::EcsError;

/// Errors that can occur in the audio system.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to start audio worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("audio worker is no longer running")]
    WorkerGone,

    #[error("audio playback failed: {0}")]
    PlaybackFailed(String),

    #[error(transparent)]
    Ecs(#[from] EcsError),
}
