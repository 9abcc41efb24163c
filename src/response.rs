use http::{header, HeaderValue, StatusCode, Version};

/// The wire level response written by the transport.
pub type RawResponse = http::Response<Vec<u8>>;

/// A response produced by a handler or the not found handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    body: String,
}

impl Response {
    /// A `200 OK` response with `body`
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            body: body.into(),
        }
    }

    /// A response with an explicit status code
    pub fn error(body: impl Into<String>, status: impl Into<u16>) -> Self {
        Self {
            status: status.into(),
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Builds the raw http response. Status codes outside `100..=999` are sent as `500`.
    pub fn into_raw(self) -> RawResponse {
        let bytes = self.body.into_bytes();
        let len = bytes.len();

        let mut raw = http::Response::new(bytes);

        *raw.version_mut() = Version::HTTP_11;
        *raw.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = raw.headers_mut();

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

        #[cfg(feature = "date")]
        if let Ok(date) = HeaderValue::from_str(&chrono::Utc::now().to_rfc2822()) {
            headers.insert(header::DATE, date);
        }

        raw
    }
}

impl From<&str> for Response {
    fn from(value: &str) -> Self {
        Response::new(value)
    }
}

impl From<String> for Response {
    fn from(value: String) -> Self {
        Response::new(value)
    }
}

/// Conversion into a `Response`, letting handlers return plain text or a bare status code.
pub trait IntoResponse {
    fn response(self) -> Response;
}

impl IntoResponse for Response {
    fn response(self) -> Response {
        self
    }
}

impl IntoResponse for &str {
    fn response(self) -> Response {
        Response::new(self)
    }
}

impl IntoResponse for String {
    fn response(self) -> Response {
        Response::new(self)
    }
}

/// A response with an empty body
impl IntoResponse for u16 {
    fn response(self) -> Response {
        Response::error(String::new(), self)
    }
}

impl IntoResponse for StatusCode {
    fn response(self) -> Response {
        self.as_u16().response()
    }
}

/// The default not found handler. Echoes the escaped request path.
pub fn not_found(path: &str) -> Response {
    Response::error(
        format!("<b>{}: 404 not found</b>", escape_html(path)),
        StatusCode::NOT_FOUND,
    )
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }

    escaped
}
