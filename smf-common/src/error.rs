//! Shared error taxonomy.
//!
//! Every crate in the workspace defines its own error enum for its own
//! concerns, but all of them carry one of these kinds so that a supervisor
//! can decide what to do with an error without knowing the crate that
//! raised it: transient I/O gets a reconnect, protocol errors stay on the
//! session, semantic errors get a response, resource errors propagate,
//! fatal errors abort the process.
use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket read/write failure, unexpected end of stream.
    TransientIo,
    /// Malformed frame: bad length, CRC mismatch, unknown command, illegal
    /// state transition. The session survives; the frame is dropped.
    Protocol,
    /// Well-formed but not fulfillable: unknown account, locked account,
    /// unregistered target, busy channel. A response code communicates it.
    Semantic,
    /// Out of memory, file not found, and similar resource failures.
    Resource,
    /// Cannot bind a listener, cannot open the master's config store. The
    /// process aborts with a non-zero exit code.
    Fatal,
}

#[derive(Debug)]
pub struct CommonError {
    pub message: String,
    pub kind: ErrorKind,
}

impl CommonError {
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        CommonError {
            message: message.into(),
            kind,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(message, ErrorKind::TransientIo)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(message, ErrorKind::Protocol)
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::new(message, ErrorKind::Semantic)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(message, ErrorKind::Resource)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(message, ErrorKind::Fatal)
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Fatal
    }
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CommonError {}

impl From<io::Error> for CommonError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CommonError::resource(err.to_string()),
            io::ErrorKind::InvalidData => CommonError::protocol(err.to_string()),
            _ => CommonError::transient(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_resource() {
        let err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let common: CommonError = err.into();
        assert_eq!(common.kind, ErrorKind::Resource);
    }

    #[test]
    fn io_invalid_data_maps_to_protocol() {
        let err = io::Error::new(io::ErrorKind::InvalidData, "bad crc");
        let common: CommonError = err.into();
        assert_eq!(common.kind, ErrorKind::Protocol);
    }

    #[test]
    fn fatal_is_flagged() {
        let err = CommonError::fatal("cannot bind listener");
        assert!(err.is_fatal());
    }
}
