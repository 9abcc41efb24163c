//! This module provides the application entry point.

use std::{
    io::ErrorKind,
    net::{SocketAddr, TcpListener},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use crate::{
    config::Options,
    error::{ConfigError, ServerError},
    handler::Declaration,
    response::{self, Response},
    routing::{Dispatcher, Fallback, RouteTable},
    tasks::{self, ConnectionTask},
};

/// Interval at which the accept loop checks for shutdown while idle
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// A cooperative shutdown signal shared between the accept loop and its owner.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_signalled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Main application entry point. Construct this type to declare your application.
pub struct App<T> {
    target: T,
    declarations: Vec<Declaration<T>>,
    options: Options,
    fallback: Fallback,
}

impl<T> App<T>
where
    T: 'static + Send + Sync,
{
    /// Constructs a new application whose handlers all share `target`
    pub fn builder(target: T) -> Self {
        Self {
            target,
            declarations: Vec::new(),
            options: Options::default(),
            fallback: Arc::new(response::not_found),
        }
    }

    /// Declares a route. Routes are tried in the order they are declared.
    pub fn route(mut self, declaration: Declaration<T>) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn routes(mut self, declarations: impl IntoIterator<Item = Declaration<T>>) -> Self {
        self.declarations.extend(declarations);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Overrides the default not found handler
    pub fn fallback(mut self, fallback: impl Fn(&str) -> Response + Send + Sync + 'static) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    /// Validates the options and every declaration. Nothing is served unless this succeeds.
    pub fn build(self) -> Result<Server<T>, ConfigError> {
        self.options.validate()?;

        let table = RouteTable::build(self.declarations)?;

        tracing::info!(routes = table.len(), "Route table built");

        Ok(Server {
            dispatcher: Arc::new(Dispatcher::new(
                table,
                Arc::new(self.target),
                self.fallback,
            )),
            options: self.options,
        })
    }

    /// Builds and runs the application on the current thread. This will currently never return
    /// unless an error occurs.
    pub fn run(self) -> Result<(), ServerError> {
        self.build()?.run()
    }
}

/// A validated application, ready to be served.
pub struct Server<T> {
    dispatcher: Arc<Dispatcher<T>>,
    options: Options,
}

impl<T> Server<T>
where
    T: 'static + Send + Sync,
{
    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Serves on the current thread until an error occurs.
    pub fn run(self) -> Result<(), ServerError> {
        self.run_until(Shutdown::new())
    }

    /// Serves on the current thread until `shutdown` is signalled
    pub fn run_until(self, shutdown: Shutdown) -> Result<(), ServerError> {
        let listener = self.bind()?;

        serve(listener, self.dispatcher, &self.options, &shutdown)
    }

    /// Binds the listener and serves from a background thread.
    pub fn start(self) -> Result<Running, ServerError> {
        let listener = self.bind()?;

        let address = listener.local_addr()?;

        let shutdown = Shutdown::new();

        let thread = {
            let shutdown = shutdown.clone();

            std::thread::spawn(move || serve(listener, self.dispatcher, &self.options, &shutdown))
        };

        Ok(Running {
            address,
            shutdown,
            thread: Some(thread),
        })
    }

    fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.options.socket_address();

        let listener = TcpListener::bind(address).map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })?;

        tracing::info!(address = %address, workers = self.options.workers, "Listening");

        Ok(listener)
    }
}

/// A server running on a background thread.
pub struct Running {
    address: SocketAddr,
    shutdown: Shutdown,
    thread: Option<JoinHandle<Result<(), ServerError>>>,
}

impl Running {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stops accepting, lets in flight requests finish and waits for every worker to exit.
    pub fn shutdown(mut self) -> Result<(), ServerError> {
        self.shutdown.signal();

        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(ServerError::Listener(std::io::Error::new(
                ErrorKind::Other,
                "accept loop panicked",
            ))),
            None => Ok(()),
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.signal();
    }
}

fn serve<T>(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher<T>>,
    options: &Options,
    shutdown: &Shutdown,
) -> Result<(), ServerError>
where
    T: 'static + Send + Sync,
{
    listener.set_nonblocking(true)?;

    let pool = tasks::connection_pool(options.workers, options.queue_bound, dispatcher);

    let timeout = options.timeout();

    while !shutdown.is_signalled() {
        let stream = match listener.accept() {
            Ok((stream, _addr)) => stream,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        // Accepted sockets may inherit the listener's non blocking mode.
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!(error = %e, "Failed to configure connection");
            continue;
        }

        let task = ConnectionTask {
            stream,
            timeout,
            shutdown: shutdown.clone(),
        };

        if pool.send_task(task).is_err() {
            break;
        }
    }

    tracing::info!("Shutting down");

    pool.shutdown();

    Ok(())
}
