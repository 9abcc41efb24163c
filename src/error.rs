//! Error types produced while building and starting an application.

use thiserror::Error;

use crate::path::ScalarType;

/// Errors raised while compiling a route template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("mismatched closing brace in path `{template}`")]
    MismatchedClosingBrace { template: String },

    #[error("nested variable declaration in path `{template}`")]
    NestedVariable { template: String },

    #[error("unterminated variable in path `{template}`")]
    UnterminatedVariable { template: String },

    #[error("more than one ':' in variable declaration `{declaration}` of path `{template}`")]
    TooManyColons {
        template: String,
        declaration: String,
    },

    #[error("empty variable name in path `{template}`")]
    EmptyVariableName { template: String },

    #[error("unsupported type `{type_name}` in path `{template}`")]
    UnsupportedType { template: String, type_name: String },

    #[error("variable `{name}` must occupy a whole path segment in `{template}`")]
    PartialSegment { template: String, name: String },

    #[error("variable `{name}` is declared more than once in path `{template}`")]
    DuplicateVariable { template: String, name: String },
}

/// Fatal configuration errors. Any of these prevents a `Server` from being constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("handler `{handler}`: {source}")]
    Pattern {
        handler: String,
        #[source]
        source: PatternError,
    },

    #[error("handler `{handler}`: unknown http method `{method}`")]
    UnknownMethod { handler: String, method: String },

    #[error("handler `{handler}`: parameter `{param}` has unsupported type `{type_name}`")]
    UnsupportedParam {
        handler: String,
        param: String,
        type_name: String,
    },

    #[error("handler `{handler}`: a query map parameter cannot be combined with other parameters")]
    MixedQueryParam { handler: String },

    #[error("handler `{handler}`: parameter `{param}` has no matching path variable")]
    MissingVariable { handler: String, param: String },

    #[error("handler `{handler}`: parameter `{param}` is declared more than once")]
    DuplicateParam { handler: String, param: String },

    #[error("handler `{handler}`: path variable `{variable}` has no matching parameter")]
    UnboundVariable { handler: String, variable: String },

    #[error("handler `{handler}`: parameter `{param}` is `{declared}` but the path declares `{expected}`")]
    TypeMismatch {
        handler: String,
        param: String,
        declared: ScalarType,
        expected: ScalarType,
    },

    #[error("handler `{handler}`: must return `Response`, found `{found}`")]
    ReturnKind { handler: String, found: String },

    #[error("handler `{handler}`: route `{template}` is already registered for the same methods")]
    DuplicateRoute { handler: String, template: String },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read options: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while starting or running a `Server`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not bind to `{address}`: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener failed: {0}")]
    Listener(#[from] std::io::Error),
}

/// Errors raised by typed access to handler arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("no argument named `{0}`")]
    Missing(String),

    #[error("argument `{name}` is not `{expected}`")]
    WrongType { name: String, expected: &'static str },
}

/// The error type handlers may fail with. Any failure is routed to the not found handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
