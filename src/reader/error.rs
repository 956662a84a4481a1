use std::{io, path::PathBuf, sync::Arc};

/// Errors reported by [`TaskFileReader`](super::TaskFileReader).
///
/// Cloneable because the same error is handed to every `error` listener.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ReadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("file could not be read: {}", path.display())]
    NotReadable {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("reader is already loading")]
    InvalidState,

    #[error("read was aborted")]
    Aborted,
}

impl ReadError {
    pub(crate) fn from_io(path: PathBuf, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => ReadError::NotFound(path),
            _ => ReadError::NotReadable {
                path,
                source: Arc::new(error),
            },
        }
    }
}
