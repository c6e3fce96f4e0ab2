use std::borrow::Cow;

/// A specialized [`StorageError`] enum of this crate.
///
/// These never escape the [`crate::FlagsStorage`] contract: backends log them
/// and degrade to empty state or dropped writes.
#[vexil_derive::vexil_error]
pub enum StorageError {
    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Malformed flags document{}: {source}", format_context(.context))]
    Json { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Write queue closed{}: {message}", format_context(.context))]
    QueueClosed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
