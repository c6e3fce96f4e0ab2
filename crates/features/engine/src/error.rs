use std::borrow::Cow;

/// Failures while loading or validating a flag registry.
///
/// Runtime operations of the engine never fail; only construction does.
#[vexil_derive::vexil_error]
pub enum RegistryError {
    #[error("Registry document is malformed{}: {source}", format_context(.context))]
    Parse { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Registry file unreadable{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Invalid flag definition{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
