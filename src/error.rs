use thiserror::Error;

use crate::volume_loader::VolumeLoaderError;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Invalid identifier `{0}`, expected `<scheme>:<locator>`")]
    InvalidId(String),

    #[error("Tool group `{0}` could not be created")]
    ToolGroup(String),

    #[error("Back end error: {0}")]
    Backend(#[from] BackendError),

    #[error("Volume error: {0}")]
    Volume(#[from] VolumeLoaderError),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Back end has not been initialized")]
    NotInitialized,

    #[error("Rendering engine `{0}` already exists")]
    DuplicateEngine(String),

    #[error("No loader registered for scheme `{0}`")]
    UnknownScheme(String),

    #[error("Volume `{0}` is not cached")]
    UnknownVolume(String),

    #[error("Volume `{0}` has not finished loading")]
    VolumeNotLoaded(String),

    #[error("Image `{id}` failed to load: {source}")]
    ImageLoad {
        id: String,
        #[source]
        source: VolumeLoaderError,
    },

    #[error("Volume error: {0}")]
    Volume(#[from] VolumeLoaderError),
}
