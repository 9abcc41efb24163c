//! This module provides http utility traits and functions for parsing requests and encoding
//! responses

use std::io::{BufRead, Write};

use http::{Request, Version};
use thiserror::Error;

use crate::{response::RawResponse, routing::Incoming, url_decoding};

/// Errors while parsing requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed Request")]
    MalformedRequest,

    #[error("Malformed Path")]
    MalformedPath,

    #[error("Malformed Query")]
    MalformedQuery,

    #[error("Failed to read from stream")]
    ReadError,

    #[error("Invalid Protocol")]
    InvalidProtocolVer,
}

/// `Version` Extension trait
pub trait VersionExt: Sized {
    /// Parse `Version` from a `&str`. Returns `Err` if the `&str` isn't a valid version of the HTTP protocol
    fn parse_version(s: &str) -> Result<Self, ParseError>;

    /// Convert a `Version` to a `&str`
    fn as_str(&self) -> &'static str;
}

impl VersionExt for Version {
    fn parse_version(s: &str) -> Result<Version, ParseError> {
        Ok(match s {
            "HTTP/0.9" => Version::HTTP_09,
            "HTTP/1.0" => Version::HTTP_10,
            "HTTP/1.1" => Version::HTTP_11,
            "HTTP/2.0" => Version::HTTP_2,
            "HTTP/3.0" => Version::HTTP_3,
            _ => return Err(ParseError::InvalidProtocolVer),
        })
    }

    fn as_str(&self) -> &'static str {
        match *self {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_2 => "HTTP/2.0",
            Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/1.1",
        }
    }
}

/// Read a request line and headers from a source. Any body is left unread.
pub fn take_request<R>(reader: &mut R) -> Result<Request<()>, ParseError>
where
    R: BufRead,
{
    let mut lines = reader.lines();

    let line = lines
        .next()
        .ok_or(ParseError::MalformedRequest)?
        .map_err(|_| ParseError::ReadError)?;

    let mut parts = line.split(' ');

    let method = parts.next().ok_or(ParseError::MalformedRequest)?;
    let uri = parts.next().ok_or(ParseError::MalformedRequest)?;
    let version = parts.next().ok_or(ParseError::MalformedRequest)?;

    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .version(Version::parse_version(version)?);

    while let Some(line) = lines
        .next()
        .transpose()
        .map_err(|_| ParseError::ReadError)?
    {
        if line.is_empty() {
            break;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::MalformedRequest)?;

        req = req.header(key.trim(), value.trim());
    }

    req.body(()).map_err(|_| ParseError::MalformedRequest)
}

/// Reduce a parsed request to its method, decoded path and decoded query.
pub fn into_incoming<B>(request: &Request<B>) -> Result<Incoming, ParseError> {
    let uri = request.uri();

    let path = url_decoding::decode_path(uri.path()).ok_or(ParseError::MalformedPath)?;

    let query = match uri.query() {
        Some(q) => url_decoding::map(q).ok_or(ParseError::MalformedQuery)?,
        None => Default::default(),
    };

    Ok(Incoming::new(request.method().clone(), path).with_query(query))
}

/// Encode a response, status line and headers first, into `writer`
pub fn write_response<W>(writer: &mut W, response: &RawResponse) -> std::io::Result<()>
where
    W: Write,
{
    write!(
        writer,
        "{} {}\r\n",
        response.version().as_str(),
        response.status()
    )?;

    for (key, value) in response.headers() {
        writer.write_all(key.as_str().as_bytes())?;
        writer.write_all(b": ")?;
        writer.write_all(value.as_bytes())?;
        writer.write_all(b"\r\n")?;
    }

    writer.write_all(b"\r\n")?;
    writer.write_all(response.body())?;

    writer.flush()
}

#[cfg(test)]
mod test {
    use std::io::BufReader;

    use http::Method;

    use super::*;
    use crate::response::Response;

    #[test]
    fn test_request() {
        let data = "GET /argtest?count=5&name=fox HTTP/1.1\r\nHost: localhost\r\n\r\n";

        let req = take_request(&mut BufReader::new(data.as_bytes())).unwrap();

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.version(), Version::HTTP_11);
        assert_eq!(req.headers()["host"], "localhost");

        let incoming = into_incoming(&req).unwrap();

        assert_eq!(incoming.path, "/argtest");
        assert_eq!(incoming.query.get("count"), Some("5"));
        assert_eq!(incoming.query.get("name"), Some("fox"));
    }

    #[test]
    fn test_bad_requests() {
        for data in [
            "",
            "GET\r\n\r\n",
            "GET / HTTP/9.9\r\n\r\n",
            "GET / HTTP/1.1\r\nno-colon\r\n\r\n",
        ] {
            assert!(take_request(&mut BufReader::new(data.as_bytes())).is_err(), "{data:?}");
        }
    }

    #[test]
    fn test_malformed_query() {
        let data = "GET /?a=%ff HTTP/1.1\r\n\r\n";

        let req = take_request(&mut BufReader::new(data.as_bytes())).unwrap();

        assert_eq!(into_incoming(&req), Err(ParseError::MalformedQuery));
    }

    #[test]
    fn test_path_is_decoded() {
        let data = "GET /argtest/5/John%20Doe?q=a%20b HTTP/1.1\r\n\r\n";

        let req = take_request(&mut BufReader::new(data.as_bytes())).unwrap();

        let incoming = into_incoming(&req).unwrap();

        assert_eq!(incoming.path, "/argtest/5/John Doe");
        assert_eq!(incoming.query.get("q"), Some("a b"));

        let data = "GET /%ff HTTP/1.1\r\n\r\n";

        let req = take_request(&mut BufReader::new(data.as_bytes())).unwrap();

        assert_eq!(into_incoming(&req), Err(ParseError::MalformedPath));
    }

    #[test]
    fn test_write_response() {
        let mut buf = Vec::new();

        write_response(&mut buf, &Response::error("nope", 404u16).into_raw()).unwrap();

        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("content-length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\nnope"));
    }
}
