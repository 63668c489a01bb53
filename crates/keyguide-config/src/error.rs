use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(keyguide::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid value for `{option}`: expected {expected}")]
    #[diagnostic(code(keyguide::config::invalid_value))]
    InvalidValue {
        option: String,
        expected: &'static str,
        #[source_code]
        src: String,
        #[label("this value")]
        span: miette::SourceSpan,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(keyguide::config::invalid))]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    #[diagnostic(code(keyguide::config::missing_field))]
    MissingField { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
