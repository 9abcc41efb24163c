//! Handler declarations.
//!
//! A `Declaration` carries everything the route table needs to validate and register a
//! handler: its templates, methods, parameter list and declared return kind. Declarations are
//! usually produced by hand or by a code generation step, for example:
//!
//! ```
//! use burrow::{Declaration, Response, ScalarType};
//!
//! let decl = Declaration::new("get_user", "/users/{id:uint}", |_: &(), args| {
//!     let id: u32 = args.get("id")?;
//!
//!     Ok(Response::new(format!("user {id}")))
//! })
//! .param("id", ScalarType::UInt)
//! .also("/u/{id:uint}");
//! ```
//!
//! Handlers may return anything implementing `IntoResponse`, so plain text is answered with
//! `200 OK`.

use std::{fmt, str::FromStr, sync::Arc};

use crate::{
    error::HandlerError,
    path::ScalarType,
    resolve::Args,
    response::{IntoResponse, Response},
};

/// A type erased handler callable shared by all workers.
pub type HandlerFn<T> = Arc<dyn Fn(&T, &Args) -> Result<Response, HandlerError> + Send + Sync>;

/// The declared type of a handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Scalar(ScalarType),
    /// Receives every query parameter of the request. Must be the only parameter.
    Query,
    /// A type outside the supported set. Rejected when the route table is built.
    Unsupported(String),
}

impl From<ScalarType> for ParamKind {
    fn from(value: ScalarType) -> Self {
        ParamKind::Scalar(value)
    }
}

impl From<&str> for ParamKind {
    fn from(value: &str) -> Self {
        match ScalarType::from_str(value) {
            Ok(ty) => ParamKind::Scalar(ty),
            Err(_) => ParamKind::Unsupported(value.to_string()),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Scalar(ty) => ty.fmt(f),
            ParamKind::Query => f.write_str("query"),
            ParamKind::Unsupported(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: impl Into<ParamKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// What a handler was declared to return. Only `Response` handlers can be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnKind {
    #[default]
    Response,
    Text,
    Unit,
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReturnKind::Response => "Response",
            ReturnKind::Text => "String",
            ReturnKind::Unit => "()",
        };

        f.write_str(s)
    }
}

/// A handler declaration awaiting validation. Every template registers its own route sharing
/// the parameters and handler.
pub struct Declaration<T> {
    pub(crate) name: String,
    pub(crate) templates: Vec<String>,
    pub(crate) methods: Vec<String>,
    pub(crate) params: Vec<Param>,
    pub(crate) returns: ReturnKind,
    pub(crate) handler: HandlerFn<T>,
}

impl<T> Declaration<T> {
    /// Declare a handler named `name` for `template`. Without further configuration it answers
    /// `GET`, takes no parameters and returns `Response`.
    pub fn new<F, R>(name: impl Into<String>, template: impl Into<String>, handler: F) -> Self
    where
        T: 'static,
        F: Fn(&T, &Args) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: IntoResponse + 'static,
    {
        Self {
            name: name.into(),
            templates: vec![template.into()],
            methods: Vec::new(),
            params: Vec::new(),
            returns: ReturnKind::Response,
            handler: Arc::new(move |target: &T, args: &Args| {
                handler(target, args).map(IntoResponse::response)
            }),
        }
    }

    /// Register the same handler under another template. Every template must bind the same
    /// parameters.
    pub fn also(mut self, template: impl Into<String>) -> Self {
        self.templates.push(template.into());

        self
    }

    /// Set the case insensitive method tokens, e.g. `["get", "post"]`
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();

        self
    }

    /// Append a parameter
    pub fn param(mut self, name: impl Into<String>, kind: impl Into<ParamKind>) -> Self {
        self.params.push(Param::new(name, kind));

        self
    }

    /// Append a parameter receiving the whole query map
    pub fn query(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Query)
    }

    pub fn returns(mut self, kind: ReturnKind) -> Self {
        self.returns = kind;

        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }
}

impl<T> fmt::Debug for Declaration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("name", &self.name)
            .field("templates", &self.templates)
            .field("methods", &self.methods)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_kinds_from_names() {
        assert_eq!(ParamKind::from("INT"), ParamKind::Scalar(ScalarType::Int));
        assert_eq!(
            ParamKind::from("UserType"),
            ParamKind::Unsupported("UserType".to_string())
        );
    }

    #[test]
    fn builder_defaults() {
        let decl: Declaration<()> = Declaration::new("root", "", |_, _| Ok(Response::new("")));

        assert_eq!(decl.templates(), [""]);
        assert!(decl.methods.is_empty());
        assert!(decl.params.is_empty());
        assert_eq!(decl.returns, ReturnKind::Response);
    }

    #[test]
    fn text_handlers_answer_ok() {
        let decl: Declaration<()> = Declaration::new("text", "/a", |_, _| Ok("plain"))
            .also("/b");

        let response = (decl.handler)(&(), &Args::default()).unwrap();

        assert_eq!(response, Response::new("plain"));
        assert_eq!(decl.templates(), ["/a", "/b"]);
    }
}
