//! Error types for layout resolution

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving a layout name to template source
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Layout file missing or not accessible
    #[error("layout '{name}' is not accessible at {}", path.display())]
    FileAccess {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Layout file could not be read after the access check passed
    #[error("error reading layout '{name}' from {}", path.display())]
    FileRead {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LayoutError {
    /// The layout name the failed resolution was asked for
    pub fn layout_name(&self) -> &str {
        match self {
            LayoutError::FileAccess { name, .. } | LayoutError::FileRead { name, .. } => name,
        }
    }

    /// The filesystem path the name resolved to
    pub fn path(&self) -> &PathBuf {
        match self {
            LayoutError::FileAccess { path, .. } | LayoutError::FileRead { path, .. } => path,
        }
    }
}
