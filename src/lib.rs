//! A declaration driven HTTP dispatch layer.
//!
//! Handlers are declared with a path template such as `/users/{id:uint}/{name}`, a set of
//! methods and a parameter list. Every declaration is validated when the [`App`] is built; once
//! serving, requests are matched against the route table in declaration order and the first
//! handler that produces a [`Response`] answers. Anything else is answered by the not found
//! handler.
//!
//! ```no_run
//! use burrow::{App, Declaration, Options, Response, ScalarType};
//!
//! let app = App::builder(())
//!     .route(Declaration::new("hello", "/hello", |_, _| Ok(Response::new("hello"))))
//!     .route(
//!         Declaration::new("square", "/square/{n:int}", |_, args| {
//!             let n: i32 = args.get("n")?;
//!
//!             Ok(Response::new((n * n).to_string()))
//!         })
//!         .param("n", ScalarType::Int),
//!     )
//!     .options(Options::default().address("127.0.0.1:8080"));
//!
//! app.run().unwrap();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod framework;
pub mod handler;
pub mod http_utils;
pub mod method;
pub mod path;
pub mod resolve;
pub mod response;
pub mod routing;
pub mod tasks;
pub mod url_decoding;


pub use config::Options;
pub use connection::Responder;
pub use error::{ArgError, ConfigError, HandlerError, PatternError, ServerError};
pub use framework::{App, Running, Server, Shutdown};
pub use handler::{Declaration, Param, ParamKind, ReturnKind};
pub use method::MethodSet;
pub use path::{Bindings, PathPattern, ScalarType, Segment, Value};
pub use resolve::{Arg, Args, FromArg};
pub use response::{IntoResponse, Response};
pub use routing::{Dispatcher, Incoming, RouteTable};
pub use tasks::TaskPool;
pub use url_decoding::QueryMap;

pub use http;
