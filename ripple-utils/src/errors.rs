//! Errors generated by the emitter stack.

/// Convenience wrapper to represent success or a meaningful emitter error.
pub type RippleResult<T> = std::result::Result<T, Error>;

/// Errors generated while normalizing or emitting a circuit.
///
/// Every error is fatal at module granularity: an emitter never flushes
/// partial output for a module whose lowering failed. Callers may catch and
/// continue at module boundaries.
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error {
    /// The input breaks the low-form contract: a primitive operand that is
    /// not a literal, reference, or subfield; a non-ground port; a reference
    /// with no driver.
    pub fn malformed_ir<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::MalformedIr(msg.to_string())),
        }
    }

    /// The input is well-formed but uses a construct this emitter does not
    /// lower (e.g. memory latencies other than 0/1, readwrite ports).
    pub fn unsupported_ir<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::UnsupportedIr(msg.to_string())),
        }
    }

    /// An IR form that an earlier pass should have removed reached the
    /// emitter. Indicates a pipeline ordering bug upstream.
    pub fn internal<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::Internal(msg.to_string())),
        }
    }

    /// Failed to write the output.
    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::WriteError(msg.to_string())),
        }
    }

    /// Miscellaneous error message.
    pub fn misc<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::Misc(msg.to_string())),
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Standard error type for ripple errors.
#[derive(Clone)]
enum ErrorKind {
    /// The circuit breaks the low-form contract.
    MalformedIr(String),
    /// The circuit uses a construct the emitter does not lower.
    UnsupportedIr(String),
    /// A previous pass left behind a form the emitter cannot accept.
    Internal(String),
    /// Failed to write the output.
    WriteError(String),
    /// Miscellaneous error message.
    Misc(String),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use ErrorKind::*;
        match self {
            MalformedIr(msg) => write!(f, "Malformed IR: {msg}"),
            UnsupportedIr(msg) => write!(f, "Unsupported IR: {msg}"),
            Internal(msg) => write!(f, "Internal error: {msg}"),
            WriteError(msg) | Misc(msg) => write!(f, "{msg}"),
        }
    }
}

// Conversions from other error types to our error type so that
// we can use `?` in all the places.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {}", e))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::write_error(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_render_their_prefix() {
        let e = Error::malformed_ir("bad operand");
        assert_eq!(format!("{:?}", e), "Malformed IR: bad operand");
        let e = Error::unsupported_ir("read latency 2");
        assert_eq!(format!("{:?}", e), "Unsupported IR: read latency 2");
        let e = Error::internal("connector form survived");
        assert_eq!(format!("{:?}", e), "Internal error: connector form survived");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::other("sink closed");
        let e: Error = io.into();
        assert!(e.message().contains("sink closed"));
    }
}
