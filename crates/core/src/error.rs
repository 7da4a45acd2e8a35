/// Result alias that carries the custom [`PadError`] type.
pub type Result<T> = std::result::Result<T, PadError>;

/// Common error type for the core crate.
///
/// Decoding never surfaces these to callers of [`crate::codec::deserialize`];
/// the codec turns them into local defaults. They do escape from the
/// serializer's sink, config loading and the raw [`crate::codec::StateReader`].
#[derive(Debug, thiserror::Error)]
pub enum PadError {
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON errors raised while reading config files.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A read needed more bytes than the stream had left.
    #[error("unexpected end of stream: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    /// A decoded value fell outside the range accepted for it.
    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: i64 },
}

impl PadError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns true when the error was caused by running out of input.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}

impl From<&str> for PadError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PadError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
