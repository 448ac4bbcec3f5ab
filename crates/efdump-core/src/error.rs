//! Error type for triple dump decoding

/// Error that ends decoding of one input file.
///
/// Triples decoded before the error have already been handed to the
/// consumer; everything after it is abandoned.
#[derive(Debug)]
pub enum DecodeError {
    /// Read or decompression failure (truncated gzip, unreadable file)
    Io(std::io::Error),
    /// Malformed triple syntax
    Syntax(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Syntax(msg) => write!(f, "syntax error: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Syntax(_) => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rio_turtle::TurtleError> for DecodeError {
    fn from(e: rio_turtle::TurtleError) -> Self {
        use std::error::Error;

        // The parser wraps reader failures; keep their kind so callers can tell
        // a truncated archive from bad syntax.
        match e.source().and_then(|s| s.downcast_ref::<std::io::Error>()) {
            Some(io) => Self::Io(std::io::Error::new(io.kind(), io.to_string())),
            None => Self::Syntax(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn display_io() {
        let err = DecodeError::Io(std::io::Error::new(ErrorKind::UnexpectedEof, "eof"));
        assert!(format!("{err}").starts_with("IO:"));
    }

    #[test]
    fn display_syntax() {
        let err = DecodeError::Syntax("line 3: unexpected '.'".to_string());
        assert_eq!(format!("{err}"), "syntax error: line 3: unexpected '.'");
    }

    #[test]
    fn io_error_has_source() {
        use std::error::Error;
        let err = DecodeError::from(std::io::Error::other("broken"));
        assert!(err.source().is_some());
        assert!(DecodeError::Syntax("x".into()).source().is_none());
    }
}
