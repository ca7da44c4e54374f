//! Request parser and response generator for the `data` resource protocol.
//!
//! One request per connection, HTTP/1.0 flavoured:
//!
//! ```text
//! Request:  METHOD /data/KEY HTTP/1.0\r\n\r\nBODY
//! Response: HTTP/1.0 CODE PHRASE\r\n\r\nBODY
//! ```
//!
//! The body is everything after the blank-line separator. A request with no
//! separator has an empty body.

use bytes::BytesMut;
use std::str;

/// The single resource served
pub const RESOURCE: &str = "data";

/// Supported request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read a key
    Get,
    /// Create a key that must not exist yet
    Put,
    /// Update a key that must already exist
    Post,
    /// Remove a key
    Delete,
}

impl Method {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Method::Get),
            "PUT" => Some(Method::Put),
            "POST" => Some(Method::Post),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// A fully validated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub key: String,
    pub body: String,
}

/// Protocol parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request could not be split into method, resource and key
    Malformed(String),
    /// Path names a resource other than `data`
    UnknownResource(String),
    /// Method token is not one of GET, PUT, POST, DELETE
    UnsupportedMethod(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Malformed(msg) => write!(f, "Malformed request: {}", msg),
            ParseError::UnknownResource(resource) => {
                write!(f, "Server does not have the given resource {}", resource)
            }
            ParseError::UnsupportedMethod(method) => {
                write!(f, "Did not understand method: {}", method)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parser for the request wire format
pub struct Parser;

impl Parser {
    /// Parse a complete request from the buffer.
    ///
    /// Checks run in a fixed order: shape of the request line, then the
    /// resource name, then the method.
    pub fn parse(buffer: &[u8]) -> Result<Request, ParseError> {
        let text = str::from_utf8(buffer)
            .map_err(|_| ParseError::Malformed("invalid UTF-8".to_string()))?;

        let (head, body) = split_head_body(text);

        let mut tokens = head.split_whitespace();
        let method_token = tokens
            .next()
            .ok_or_else(|| ParseError::Malformed("empty request".to_string()))?;
        let path = tokens
            .next()
            .ok_or_else(|| ParseError::Malformed("missing path".to_string()))?;

        let (resource, key) = split_path(path)?;

        if resource != RESOURCE {
            return Err(ParseError::UnknownResource(resource.to_string()));
        }

        let method = Method::from_token(method_token)
            .ok_or_else(|| ParseError::UnsupportedMethod(method_token.to_string()))?;

        Ok(Request {
            method,
            key: key.to_string(),
            body: body.trim_end_matches(['\r', '\n']).to_string(),
        })
    }
}

/// Split request text at the first blank line
fn split_head_body(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let crlf = text.find("\r\n\r\n").map(|pos| (pos, 4));
    let lf = text.find("\n\n").map(|pos| (pos, 2));

    let separator = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match separator {
        Some((pos, len)) => (&text[..pos], &text[pos + len..]),
        None => (text, ""),
    }
}

/// Split `/resource/key` into its two segments
fn split_path(path: &str) -> Result<(&str, &str), ParseError> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| ParseError::Malformed(format!("path must start with '/': {}", path)))?;

    let mut segments = rest.split('/');
    let resource = segments.next().unwrap_or_default();
    let key = segments.next().unwrap_or_default();

    if resource.is_empty() {
        return Err(ParseError::Malformed("missing resource".to_string()));
    }
    if key.is_empty() {
        return Err(ParseError::Malformed("missing key".to_string()));
    }
    if segments.any(|segment| !segment.is_empty()) {
        return Err(ParseError::Malformed(format!("unexpected path segments: {}", path)));
    }

    Ok((resource, key))
}

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
        }
    }
}

/// A response ready to be written to the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            body: body.into(),
        }
    }

    pub fn bad_request(body: impl Into<String>) -> Self {
        Self {
            status: Status::BadRequest,
            body: body.into(),
        }
    }

    pub fn not_found(body: impl Into<String>) -> Self {
        Self {
            status: Status::NotFound,
            body: body.into(),
        }
    }

    /// Serialize as `HTTP/1.0 CODE PHRASE\r\n\r\nBODY`
    pub fn to_bytes(&self) -> BytesMut {
        let header = format!(
            "HTTP/1.0 {} {}\r\n\r\n",
            self.status.code(),
            self.status.reason()
        );
        let mut response = BytesMut::with_capacity(header.len() + self.body.len());
        response.extend_from_slice(header.as_bytes());
        response.extend_from_slice(self.body.as_bytes());
        response
    }
}

impl From<&ParseError> for Response {
    fn from(err: &ParseError) -> Self {
        Response::bad_request(err.to_string())
    }
}
