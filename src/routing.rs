//! The route table and dispatcher.
//!
//! The table is built once from a list of declarations, validating every declaration before any
//! request is served. After construction it is immutable and may be shared freely between
//! worker threads.

use std::{
    collections::HashSet,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use http::Method;

use crate::{
    error::ConfigError,
    handler::{Declaration, HandlerFn, Param, ParamKind, ReturnKind},
    method::MethodSet,
    path::{Bindings, PathPattern},
    resolve::{Arg, Args},
    response::Response,
    url_decoding::QueryMap,
};

/// The handler called when no route produced a response. Receives the request path.
pub type Fallback = Arc<dyn Fn(&str) -> Response + Send + Sync>;

/// An abstract incoming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub method: Method,
    pub path: String,
    pub query: QueryMap,
}

impl Incoming {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryMap::new(),
        }
    }

    pub fn with_query(mut self, query: QueryMap) -> Self {
        self.query = query;

        self
    }
}

/// A validated, registered handler.
pub struct RouteEntry<T> {
    name: String,
    template: String,
    pattern: PathPattern,
    params: Vec<Param>,
    handler: HandlerFn<T>,
}

impl<T> RouteEntry<T> {
    /// Validate a declaration and compile each of its templates into an entry.
    fn build(decl: Declaration<T>) -> Result<Vec<Self>, ConfigError> {
        let Declaration {
            name,
            templates,
            methods,
            params,
            returns,
            handler,
        } = decl;

        let methods = MethodSet::from_tokens(methods.iter().map(String::as_str)).map_err(
            |method| ConfigError::UnknownMethod {
                handler: name.clone(),
                method: method.to_string(),
            },
        )?;

        for param in &params {
            match &param.kind {
                ParamKind::Unsupported(type_name) => {
                    return Err(ConfigError::UnsupportedParam {
                        handler: name,
                        param: param.name.clone(),
                        type_name: type_name.clone(),
                    })
                }
                ParamKind::Query if params.len() > 1 => {
                    return Err(ConfigError::MixedQueryParam { handler: name })
                }
                _ => {}
            }
        }

        let mut patterns = Vec::with_capacity(templates.len());

        for template in templates {
            let pattern = PathPattern::compile(&template, methods).map_err(|source| {
                ConfigError::Pattern {
                    handler: name.clone(),
                    source,
                }
            })?;

            check_params(&name, &pattern, &params)?;

            patterns.push((template, pattern));
        }

        if returns != ReturnKind::Response {
            return Err(ConfigError::ReturnKind {
                handler: name,
                found: returns.to_string(),
            });
        }

        Ok(patterns
            .into_iter()
            .map(|(template, pattern)| Self {
                name: name.clone(),
                template,
                pattern,
                params: params.clone(),
                handler: handler.clone(),
            })
            .collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Whether the handler takes the request's query map instead of path variables
    pub fn takes_query(&self) -> bool {
        matches!(
            self.params.as_slice(),
            [Param {
                kind: ParamKind::Query,
                ..
            }]
        )
    }

    /// Build arguments in declaration order and call the handler. Returns `None` if an argument
    /// is missing, the handler fails or the handler panics.
    pub fn invoke(&self, target: &T, mut bindings: Bindings, query: &QueryMap) -> Option<Response> {
        let mut args = Args::new();

        for param in &self.params {
            let arg = match param.kind {
                ParamKind::Query => Arg::Query(query.clone()),
                _ => Arg::Value(bindings.take(&param.name)?),
            };

            args.push(param.name.clone(), arg);
        }

        match catch_unwind(AssertUnwindSafe(|| (self.handler)(target, &args))) {
            Ok(Ok(response)) => Some(response),
            Ok(Err(e)) => {
                tracing::warn!(handler = %self.name, error = %e, "Handler failed");

                None
            }
            Err(panic) => {
                tracing::warn!(handler = %self.name, panic = ?panic, "Handler panicked");

                None
            }
        }
    }
}

fn check_params(handler: &str, pattern: &PathPattern, params: &[Param]) -> Result<(), ConfigError> {
    let variables = pattern.variable_types();

    if let [Param {
        kind: ParamKind::Query,
        ..
    }] = params
    {
        return match pattern.variables().next() {
            Some((variable, _)) => Err(ConfigError::UnboundVariable {
                handler: handler.to_string(),
                variable: variable.to_string(),
            }),
            None => Ok(()),
        };
    }

    for param in params {
        let ParamKind::Scalar(declared) = param.kind else {
            continue;
        };

        match variables.get(param.name.as_str()) {
            None => {
                return Err(ConfigError::MissingVariable {
                    handler: handler.to_string(),
                    param: param.name.clone(),
                })
            }
            Some(&expected) if expected != declared => {
                return Err(ConfigError::TypeMismatch {
                    handler: handler.to_string(),
                    param: param.name.clone(),
                    declared,
                    expected,
                })
            }
            Some(_) => {}
        }
    }

    if let Some((variable, _)) = pattern
        .variables()
        .find(|(v, _)| !params.iter().any(|p| p.name == *v))
    {
        return Err(ConfigError::UnboundVariable {
            handler: handler.to_string(),
            variable: variable.to_string(),
        });
    }

    // Every name matched, so a count difference means a repeated parameter.
    if params.len() != variables.len() {
        let mut seen = HashSet::new();

        if let Some(param) = params.iter().find(|p| !seen.insert(p.name.as_str())) {
            return Err(ConfigError::DuplicateParam {
                handler: handler.to_string(),
                param: param.name.clone(),
            });
        }
    }

    Ok(())
}

/// The result of a successful lookup.
pub struct Resolved<'a, T> {
    pub entry: &'a RouteEntry<T>,
    pub bindings: Bindings,
}

/// An ordered, immutable list of routes.
pub struct RouteTable<T> {
    entries: Vec<RouteEntry<T>>,
}

impl<T> RouteTable<T> {
    /// Validate and register every declaration in order. The first invalid declaration aborts
    /// the build.
    pub fn build<I>(declarations: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Declaration<T>>,
    {
        let mut entries: Vec<RouteEntry<T>> = Vec::new();

        for decl in declarations {
            for entry in RouteEntry::build(decl)? {
                if entries.iter().any(|e| e.pattern == entry.pattern) {
                    return Err(ConfigError::DuplicateRoute {
                        handler: entry.name,
                        template: entry.template,
                    });
                }

                tracing::debug!(handler = %entry.name, template = %entry.template, "Registered route");

                entries.push(entry);
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[RouteEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first entry, in registration order, answering `method` whose pattern matches
    /// `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<Resolved<'_, T>> {
        self.entries
            .iter()
            .filter(|entry| entry.pattern.enabled_for(method))
            .find_map(|entry| {
                entry
                    .pattern
                    .bind(path)
                    .map(|bindings| Resolved { entry, bindings })
            })
    }
}

/// A route table paired with its handler target and not found handler.
pub struct Dispatcher<T> {
    table: RouteTable<T>,
    target: Arc<T>,
    fallback: Fallback,
}

impl<T> Dispatcher<T> {
    pub fn new(table: RouteTable<T>, target: Arc<T>, fallback: Fallback) -> Self {
        Self {
            table,
            target,
            fallback,
        }
    }

    pub fn table(&self) -> &RouteTable<T> {
        &self.table
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Produce the response for `request`. Every failure is answered by the not found handler.
    pub fn dispatch(&self, request: &Incoming) -> Response {
        let response = self
            .table
            .resolve(&request.method, &request.path)
            .and_then(|Resolved { entry, bindings }| {
                tracing::debug!(handler = %entry.name, path = %request.path, "Dispatching");

                entry.invoke(&self.target, bindings, &request.query)
            });

        match response {
            Some(r) => r,
            None => (self.fallback)(&request.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{path::ScalarType, response::not_found};

    fn ok(body: &'static str) -> impl Fn(&(), &Args) -> Result<Response, crate::HandlerError> {
        move |_, _| Ok(Response::new(body))
    }

    fn dispatcher(decls: Vec<Declaration<()>>) -> Dispatcher<()> {
        Dispatcher::new(
            RouteTable::build(decls).unwrap(),
            Arc::new(()),
            Arc::new(not_found),
        )
    }

    #[test]
    fn mismatched_params() {
        let decl = Declaration::new("method", "/{var1:int}/{str}", ok(""))
            .param("var1", ScalarType::UInt)
            .param("str", ScalarType::Byte);

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn missing_params() {
        let decl = Declaration::new("method", "/{var1:int}/{str}", ok(""));

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::UnboundVariable { variable, .. }) if variable == "var1"
        ));
    }

    #[test]
    fn extra_param() {
        let decl = Declaration::new("method", "/{id:int}", ok(""))
            .param("id", ScalarType::Int)
            .param("other", ScalarType::Int);

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::MissingVariable { param, .. }) if param == "other"
        ));
    }

    #[test]
    fn repeated_param_name() {
        let decl = Declaration::new("method", "/{id:int}", ok(""))
            .param("id", ScalarType::Int)
            .param("id", ScalarType::Int);

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::DuplicateParam { param, .. }) if param == "id"
        ));
    }

    #[test]
    fn wrong_http_method() {
        let decl = Declaration::new("method", "/", ok("")).methods(["stuff"]);

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::UnknownMethod { handler, method }) if handler == "method" && method == "stuff"
        ));
    }

    #[test]
    fn no_response() {
        let decl = Declaration::new("method", "/", ok("")).returns(ReturnKind::Unit);

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::ReturnKind { .. })
        ));
    }

    #[test]
    fn unsupported_param_type() {
        let decl = Declaration::new("method", "/{u}", ok("")).param("u", "UserType");

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::UnsupportedParam { type_name, .. }) if type_name == "UserType"
        ));
    }

    #[test]
    fn query_param_must_stand_alone() {
        let decl = Declaration::new("method", "/{id:int}", ok(""))
            .query("query")
            .param("id", ScalarType::Int);

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::MixedQueryParam { .. })
        ));

        let decl = Declaration::new("method", "/{id:int}", ok("")).query("query");

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::UnboundVariable { .. })
        ));
    }

    #[test]
    fn bad_template_names_handler() {
        let decl = Declaration::new("broken", "/{a", ok(""));

        let err = RouteTable::build([decl]).err().unwrap();

        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn build_aborts_on_first_error() {
        let decls = vec![
            Declaration::new("good", "/good", ok("")),
            Declaration::new("bad", "/bad", ok("")).returns(ReturnKind::Text),
        ];

        assert!(RouteTable::build(decls).is_err());
    }

    #[test]
    fn duplicate_route() {
        let decls = vec![
            Declaration::new("a", "/same", ok("")),
            Declaration::new("b", "/same", ok("")).methods(["GET"]),
        ];

        assert!(matches!(
            RouteTable::build(decls),
            Err(ConfigError::DuplicateRoute { handler, .. }) if handler == "b"
        ));

        let decls = vec![
            Declaration::new("a", "/same", ok("")),
            Declaration::new("b", "/same", ok("")).methods(["post"]),
        ];

        assert_eq!(RouteTable::build(decls).unwrap().len(), 2);
    }

    #[test]
    fn one_handler_many_templates() {
        let decl = Declaration::new("user", "/users/{id:uint}", |_: &(), args: &Args| {
            Ok(args.get::<u32>("id")?.to_string())
        })
        .param("id", ScalarType::UInt)
        .also("/u/{id:uint}");

        let dispatcher = dispatcher(vec![decl]);

        assert_eq!(dispatcher.table().len(), 2);
        assert_eq!(
            dispatcher.dispatch(&Incoming::new(Method::GET, "/users/7")).body(),
            "7"
        );
        assert_eq!(
            dispatcher.dispatch(&Incoming::new(Method::GET, "/u/8")).body(),
            "8"
        );
    }

    #[test]
    fn every_template_must_bind_the_params() {
        let decl = Declaration::new("user", "/users/{id:uint}", ok(""))
            .param("id", ScalarType::UInt)
            .also("/u/{name}");

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::MissingVariable { param, .. }) if param == "id"
        ));

        let decl = Declaration::new("user", "/a", ok("")).also("/a");

        assert!(matches!(
            RouteTable::build([decl]),
            Err(ConfigError::DuplicateRoute { template, .. }) if template == "/a"
        ));
    }

    #[test]
    fn first_match_wins() {
        let dispatcher = dispatcher(vec![
            Declaration::new("by_id", "/items/{id:int}", ok("by_id")).param("id", ScalarType::Int),
            Declaration::new("by_name", "/items/{name}", ok("by_name")).param("name", "string"),
        ]);

        let by_id = dispatcher.dispatch(&Incoming::new(Method::GET, "/items/5"));
        let by_name = dispatcher.dispatch(&Incoming::new(Method::GET, "/items/five"));

        assert_eq!(by_id.body(), "by_id");
        assert_eq!(by_name.body(), "by_name");
    }

    #[test]
    fn method_filtering() {
        let dispatcher = dispatcher(vec![
            Declaration::new("read", "/thing", ok("read")),
            Declaration::new("write", "/thing", ok("write")).methods(["put", "patch"]),
        ]);

        assert_eq!(
            dispatcher.dispatch(&Incoming::new(Method::GET, "/thing")).body(),
            "read"
        );
        assert_eq!(
            dispatcher.dispatch(&Incoming::new(Method::PATCH, "/thing")).body(),
            "write"
        );
        assert_eq!(
            dispatcher
                .dispatch(&Incoming::new(Method::DELETE, "/thing"))
                .status(),
            404
        );
    }

    #[test]
    fn arguments_bound_by_name() {
        let decl = Declaration::new("sum", "/sum/{a:long}/{b:long}", |_: &(), args: &Args| {
            let a: i64 = args.get("a")?;
            let b: i64 = args.get("b")?;

            Ok(Response::new((a + b).to_string()))
        })
        .param("b", ScalarType::Long)
        .param("a", ScalarType::Long);

        let dispatcher = dispatcher(vec![decl]);

        let response = dispatcher.dispatch(&Incoming::new(Method::GET, "/sum/40/2"));

        assert_eq!(response.body(), "42");
    }

    #[test]
    fn query_handler_receives_query_map() {
        let decl = Declaration::new("namevalue", "/namevalue", |_: &(), args: &Args| {
            let query = args.query().ok_or("missing query")?;

            let body: String = query.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();

            Ok(Response::new(body))
        })
        .query("query");

        let dispatcher = dispatcher(vec![decl]);

        let request = Incoming::new(Method::GET, "/namevalue")
            .with_query([("a", "1"), ("b", "2")].into_iter().collect());

        assert_eq!(dispatcher.dispatch(&request).body(), "a:1\nb:2\n");
    }

    #[test]
    fn failing_handlers_fall_through() {
        let dispatcher = dispatcher(vec![
            Declaration::new("err", "/err", |_: &(), _: &Args| {
                Err::<Response, _>("boom".into())
            }),
            Declaration::new("panic", "/panic", |_: &(), _: &Args| -> Result<Response, _> {
                panic!("boom")
            }),
        ]);

        for path in ["/err", "/panic", "/missing"] {
            let response = dispatcher.dispatch(&Incoming::new(Method::GET, path));

            assert_eq!(response, not_found(path));
        }
    }

    #[test]
    fn conversion_failure_is_not_found() {
        let dispatcher = dispatcher(vec![Declaration::new("n", "/n/{n:byte}", ok("n"))
            .param("n", ScalarType::Byte)]);

        assert_eq!(
            dispatcher.dispatch(&Incoming::new(Method::GET, "/n/300")).status(),
            404
        );
    }

    #[test]
    fn custom_fallback() {
        let dispatcher: Dispatcher<()> = Dispatcher::new(
            RouteTable::build([]).unwrap(),
            Arc::new(()),
            Arc::new(|path: &str| Response::error(format!("nothing at {path}"), 418u16)),
        );

        let response = dispatcher.dispatch(&Incoming::new(Method::GET, "/x"));

        assert_eq!(response.status(), 418);
        assert_eq!(response.body(), "nothing at /x");
    }

    #[test]
    fn target_is_shared() {
        struct Greeter {
            greeting: String,
        }

        let decl = Declaration::new("hello", "/hello/{name}", |g: &Greeter, args: &Args| {
            Ok(Response::new(format!("{} {}", g.greeting, args.get::<String>("name")?)))
        })
        .param("name", ScalarType::String);

        let dispatcher = Dispatcher::new(
            RouteTable::build([decl]).unwrap(),
            Arc::new(Greeter {
                greeting: "hi".to_string(),
            }),
            Arc::new(not_found),
        );

        let response = dispatcher.dispatch(&Incoming::new(Method::GET, "/hello/fox"));

        assert_eq!(response.body(), "hi fox");
    }
}
