use catalog::CatalogError;
use library::LibraryError;
use metadata::MetadataError;

#[derive(Debug)]
pub enum VfsError {
    NotFound,
    NotADirectory,
    IsDirectory,
    BadHandle,
    /// No index has been published yet.
    NotReady,
    /// A body read did not continue where the forward-only stream stopped.
    StreamConsistency { expected: u64, requested: u64 },
    /// The body stream failed earlier on this handle; reopen to retry.
    StreamFailed,
    Catalog(CatalogError),
    Library(LibraryError),
    Metadata(MetadataError),
    Io(std::io::Error),
}

impl VfsError {
    /// The errno a host filesystem layer should report.
    pub fn errno(&self) -> i32 {
        match self {
            VfsError::NotFound => libc::ENOENT,
            VfsError::NotADirectory => libc::ENOTDIR,
            VfsError::IsDirectory => libc::EISDIR,
            VfsError::BadHandle => libc::EBADF,
            VfsError::Catalog(err) if err.is_not_found() => libc::ENOENT,
            VfsError::NotReady
            | VfsError::StreamConsistency { .. }
            | VfsError::StreamFailed
            | VfsError::Catalog(_)
            | VfsError::Library(_)
            | VfsError::Metadata(_)
            | VfsError::Io(_) => libc::EIO,
        }
    }
}

impl std::fmt::Display for VfsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VfsError::NotFound => write!(f, "no such entry"),
            VfsError::NotADirectory => write!(f, "not a directory"),
            VfsError::IsDirectory => write!(f, "is a directory"),
            VfsError::BadHandle => write!(f, "unknown file handle"),
            VfsError::NotReady => write!(f, "catalog index not loaded"),
            VfsError::StreamConsistency { expected, requested } => write!(
                f,
                "non-sequential body read: stream is at {} but {} was requested",
                expected, requested
            ),
            VfsError::StreamFailed => write!(f, "audio stream failed; reopen the file"),
            VfsError::Catalog(err) => write!(f, "catalog error: {}", err),
            VfsError::Library(err) => write!(f, "library error: {}", err),
            VfsError::Metadata(err) => write!(f, "metadata error: {}", err),
            VfsError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for VfsError {}

impl From<CatalogError> for VfsError {
    fn from(err: CatalogError) -> Self {
        VfsError::Catalog(err)
    }
}

impl From<LibraryError> for VfsError {
    fn from(err: LibraryError) -> Self {
        VfsError::Library(err)
    }
}

impl From<MetadataError> for VfsError {
    fn from(err: MetadataError) -> Self {
        VfsError::Metadata(err)
    }
}

impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        VfsError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::VfsError;
    use catalog::CatalogError;

    #[test]
    fn maps_errors_to_errno() {
        assert_eq!(VfsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(VfsError::BadHandle.errno(), libc::EBADF);
        assert_eq!(VfsError::IsDirectory.errno(), libc::EISDIR);
        assert_eq!(
            VfsError::StreamConsistency {
                expected: 0,
                requested: 10
            }
            .errno(),
            libc::EIO
        );
        assert_eq!(VfsError::StreamFailed.errno(), libc::EIO);
        assert_eq!(VfsError::Catalog(CatalogError::NotFound).errno(), libc::ENOENT);
        assert_eq!(
            VfsError::Catalog(CatalogError::Unavailable("down".to_string())).errno(),
            libc::EIO
        );
    }
}
