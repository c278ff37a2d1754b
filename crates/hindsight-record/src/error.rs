use thiserror::Error;

/// Errors from writing trajectory and world files.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RecordError = io_err.into();
        assert!(matches!(err, RecordError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
