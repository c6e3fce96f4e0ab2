use std::borrow::Cow;

#[vexil_derive::vexil_error]
pub enum UsageError {
    #[error("Histogram sink unavailable{}: {message}", format_context(.context))]
    SinkUnavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal reporting error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
