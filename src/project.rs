use std::path::{Path, PathBuf};

use crate::error::HostError;

pub const PROJECT_MANIFEST: &str = "project.shrikeproj";
pub const SCRIPTS_SUBDIR: &str = "assets/scripts";

/// Walks from `start` to the filesystem root looking for the directory that
/// holds the project manifest. Absence is fatal at startup; there is no
/// project to run without it.
pub fn find_project_root(start: impl AsRef<Path>) -> Result<PathBuf, HostError> {
    let start = start.as_ref();
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(PROJECT_MANIFEST).is_file() {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err(HostError::ProjectRootNotFound {
                marker: PROJECT_MANIFEST,
                start: start.to_path_buf(),
            });
        }
    }
}

pub fn locate_scripts_dir(start: impl AsRef<Path>) -> Result<PathBuf, HostError> {
    find_project_root(start).map(|root| root.join(SCRIPTS_SUBDIR))
}
