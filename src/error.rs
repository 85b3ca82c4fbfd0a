use std::path::PathBuf;

use thiserror::Error;

use crate::assets::AssetError;

/// Failures the host can encounter. Only `ProjectRootNotFound` (and a watcher
/// that cannot subscribe at construction) ever propagate to the embedding
/// application; everything else is captured as a fault and rendered on the
/// diagnostic screen.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("no '{marker}' in '{}' or any parent directory", start.display())]
    ProjectRootNotFound { marker: &'static str, start: PathBuf },

    /// The entry script could not be read, parsed, or executed.
    #[error("script load failed: {message}")]
    ScriptLoad { message: String },

    /// A lifecycle callback raised an error while running.
    #[error("script {hook} failed: {message}")]
    ScriptRuntime { hook: &'static str, message: String },

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("script watcher failed")]
    Watch(#[source] notify::Error),
}
