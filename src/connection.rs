use std::{
    io::{BufReader, ErrorKind, Read},
    net::TcpStream,
    time::{Duration, Instant},
};

use crate::{
    framework::Shutdown,
    http_utils::{self, into_incoming, take_request, ParseError},
    response::Response,
    routing::Incoming,
};

/// Upper bound on the bytes read for a request line and headers
const MAX_HEAD: u64 = 64 * 1024;

/// Longest a single blocking read may wait before the deadline and shutdown are checked again
const READ_POLL: Duration = Duration::from_millis(100);

/// Where a worker writes the response of a request. Consumed by the write.
pub trait Responder: Send {
    fn respond(self: Box<Self>, response: Response) -> std::io::Result<()>;
}

impl Responder for TcpStream {
    fn respond(mut self: Box<Self>, response: Response) -> std::io::Result<()> {
        http_utils::write_response(&mut *self, &response.into_raw())
    }
}

/// A read half that gives up once its deadline passes or the server shuts down.
struct HeadReader<'a> {
    stream: TcpStream,
    deadline: Option<Instant>,
    shutdown: &'a Shutdown,
}

impl Read for HeadReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            match self.stream.read(buf) {
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    let expired = self.deadline.map_or(false, |d| Instant::now() >= d);

                    if expired || self.shutdown.is_signalled() {
                        return Err(e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                result => return result,
            }
        }
    }
}

/// Reads one request head from `stream`. The returned stream is the write half used to respond.
///
/// Without a `timeout` the read only ends when the client sends a head, closes the connection or
/// `shutdown` is signalled.
pub fn read_request(
    stream: TcpStream,
    timeout: Option<Duration>,
    shutdown: &Shutdown,
) -> Result<(Incoming, TcpStream), ParseError> {
    let poll = timeout.map_or(READ_POLL, |t| t.min(READ_POLL));

    stream
        .set_read_timeout(Some(poll))
        .and_then(|_| stream.set_write_timeout(timeout))
        .map_err(|_| ParseError::ReadError)?;

    let writer = stream.try_clone().map_err(|_| ParseError::ReadError)?;

    let reader = HeadReader {
        stream,
        deadline: timeout.map(|t| Instant::now() + t),
        shutdown,
    };

    let mut reader = BufReader::new(reader.take(MAX_HEAD));

    let request = take_request(&mut reader)?;

    Ok((into_incoming(&request)?, writer))
}
