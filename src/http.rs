//! Minimal HTTP/1.0 transport.
//!
//! An [`HttpTransaction`] owns one open connection and performs exactly one
//! request/response exchange on it. There is no keep-alive: once the response
//! head has been read the connection belongs to the body stream, and closing
//! that stream closes the connection.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::connection::{ConnectionFactory, DnsResolver, Resolver};
use crate::error::{Error, Result};

/// Upper bound on the size of a response status line plus headers (64KB)
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Decodes a fully read response body.
pub type BodyDecoder = fn(&[u8]) -> Result<Value>;

/// Body decoder for JSON responses
pub fn json_decoder(raw: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(raw)?)
}

/// Request body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// Structured value, sent as JSON text
    Json(Value),
    /// Sent verbatim
    Text(String),
}

impl Body {
    /// Serialize `value` into a body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::from(serde_json::to_value(value)?))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Json(_) => false,
            Body::Text(text) => text.is_empty(),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Body::Json(_))
    }

    /// The text that goes on the wire after the request head.
    pub fn to_text(&self) -> Result<String> {
        match self {
            Body::Empty => Ok(String::new()),
            Body::Json(value) => Ok(serde_json::to_string(value)?),
            Body::Text(text) => Ok(text.clone()),
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Body::Empty,
            Value::Object(_) | Value::Array(_) => Body::Json(value),
            Value::String(text) => Body::Text(text),
            other => Body::Text(other.to_string()),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

/// Response headers in the order received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Get the first header value matching `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Body of a response: decoded when the transaction has a decoder, otherwise
/// the raw stream. Dropping the stream closes the connection.
pub enum ResponseBody<S = TcpStream> {
    Decoded(Value),
    Stream(BufReader<S>),
}

impl<S> fmt::Debug for ResponseBody<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Decoded(value) => f.debug_tuple("Decoded").field(value).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A parsed HTTP response
#[derive(Debug)]
pub struct Response<S = TcpStream> {
    status: u16,
    reason: String,
    headers: Headers,
    body: ResponseBody<S>,
}

impl<S: AsyncRead + Unpin> Response<S> {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &ResponseBody<S> {
        &self.body
    }

    /// Take ownership of the body. A raw stream must be read (or dropped) by
    /// the caller.
    pub fn into_body(self) -> ResponseBody<S> {
        self.body
    }

    /// The body as JSON, reading and decoding the raw stream if necessary.
    pub async fn into_json(self) -> Result<Value> {
        match self.body {
            ResponseBody::Decoded(value) => Ok(value),
            ResponseBody::Stream(mut stream) => {
                let mut raw = Vec::new();
                stream.read_to_end(&mut raw).await?;
                json_decoder(&raw)
            }
        }
    }
}

/// One request/response exchange over one connection. Not reusable.
pub struct HttpTransaction<S = TcpStream> {
    stream: Option<S>,
    decoder: Option<BodyDecoder>,
    sent: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> HttpTransaction<S> {
    pub fn new(stream: S, decoder: Option<BodyDecoder>) -> Self {
        Self {
            stream: Some(stream),
            decoder,
            sent: false,
        }
    }

    /// Whether the transaction still holds its connection.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write the request. No `Content-Length` is added; pass it in `headers`
    /// if the server needs it.
    pub async fn send_request(
        &mut self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: &Body,
    ) -> Result<()> {
        if self.sent {
            return Err(Error::protocol("Request already sent on this transaction"));
        }
        let request = encode_request(method, path, headers, body)?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::protocol("Transaction is closed"))?;

        self.sent = true;
        stream.write_all(&request).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read the status line, headers and body.
    ///
    /// The connection moves out of the transaction before anything is read,
    /// so it is closed on every error path. With a decoder the body is read
    /// to the end, the stream dropped, and the decoded value returned.
    pub async fn read_response(&mut self) -> Result<Response<S>> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| Error::protocol("Transaction is closed"))?;
        let mut reader = BufReader::new(stream);
        let mut budget = MAX_HEAD_SIZE;

        let status_line = read_head_line(&mut reader, &mut budget)
            .await?
            .ok_or_else(|| Error::protocol("Empty response"))?;
        let (status, reason) = parse_status_line(&status_line)?;

        let mut headers = Vec::new();
        loop {
            let line = read_head_line(&mut reader, &mut budget)
                .await?
                .ok_or_else(|| Error::protocol("Unexpected end of response headers"))?;
            if line.is_empty() {
                break;
            }
            headers.push(parse_header_line(&line)?);
        }

        let body = match self.decoder {
            Some(decode) => {
                let mut raw = Vec::new();
                let read = reader.read_to_end(&mut raw).await;
                drop(reader);
                read?;
                ResponseBody::Decoded(decode(&raw)?)
            }
            None => ResponseBody::Stream(reader),
        };

        Ok(Response {
            status,
            reason,
            headers: Headers(headers),
            body,
        })
    }

    /// Release the connection. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }
}

/// Creates a fresh [`HttpTransaction`] on a new connection for every call.
pub struct TransactionFactory<R = DnsResolver> {
    connections: ConnectionFactory<R>,
    decoder: Option<BodyDecoder>,
}

impl TransactionFactory {
    pub fn new(host: impl Into<String>, port: u16, decoder: Option<BodyDecoder>) -> Self {
        Self::with_connections(ConnectionFactory::new(host, port), decoder)
    }
}

impl<R: Resolver> TransactionFactory<R> {
    pub fn with_connections(connections: ConnectionFactory<R>, decoder: Option<BodyDecoder>) -> Self {
        Self { connections, decoder }
    }

    pub fn connections(&self) -> &ConnectionFactory<R> {
        &self.connections
    }

    /// Connect and wrap the connection in a new transaction.
    pub async fn create(&self) -> Result<HttpTransaction<TcpStream>> {
        let stream = self.connections.connect().await?;
        Ok(HttpTransaction::new(stream, self.decoder))
    }
}

fn check_token(kind: &str, token: &str) -> Result<()> {
    if token.is_empty() || token.contains(['\r', '\n']) {
        return Err(Error::invalid(format!("Illegal {} '{}'", kind, token.escape_debug())));
    }
    Ok(())
}

/// Serialize a request head and body.
fn encode_request(method: &str, path: &str, headers: &[(&str, &str)], body: &Body) -> Result<Vec<u8>> {
    check_token("method", method)?;
    check_token("path", path)?;
    if method.contains(' ') || path.contains(' ') {
        return Err(Error::invalid(format!("Illegal request line '{} {}'", method, path)));
    }

    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(format!("{} {} HTTP/1.0\r\n", method, path).as_bytes());

    for (key, value) in headers {
        check_token("header name", key)?;
        if value.contains(['\r', '\n']) {
            return Err(Error::invalid(format!("Illegal value for header '{}'", key)));
        }
        buf.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
    }
    buf.extend_from_slice(b"\r\n");

    if !body.is_empty() {
        buf.extend_from_slice(body.to_text()?.as_bytes());
    }

    Ok(buf)
}

/// Read one CRLF (or LF) terminated line of the response head, without its
/// terminator. `None` means the stream ended before any byte was read.
async fn read_head_line<R: AsyncBufRead + Unpin>(reader: &mut R, budget: &mut usize) -> Result<Option<String>> {
    let mut line = Vec::new();
    let n = (&mut *reader).take(*budget as u64).read_until(b'\n', &mut line).await?;

    if n == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        if n == *budget {
            return Err(Error::protocol(format!(
                "Response head exceeds {} bytes",
                MAX_HEAD_SIZE
            )));
        }
        return Err(Error::protocol("Unexpected end of response head"));
    }
    *budget -= n;

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| Error::protocol("Invalid UTF-8 in response head"))
}

/// Parse `HTTP/1.x <status> <reason>`.
fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let mut parts = line.splitn(3, ' ');
    let proto = parts.next().unwrap_or_default();

    if !matches!(proto, "HTTP/1.0" | "HTTP/1.1") {
        return Err(Error::protocol(format!("Illegal protocol declaration '{}'", proto)));
    }

    let code = parts.next().unwrap_or_default();
    let status = code
        .parse::<u16>()
        .ok()
        .filter(|status| (100..=999).contains(status))
        .ok_or_else(|| Error::protocol(format!("Illegal status code '{}'", code)))?;

    let reason = parts.next().unwrap_or_default().trim().to_string();
    Ok((status, reason))
}

/// Parse `Key: Value`. The value is trimmed; the key must not be empty.
fn parse_header_line(line: &str) -> Result<(String, String)> {
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| Error::protocol(format!("Malformed header line '{}'", line)))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(Error::protocol(format!("Empty header name in '{}'", line)));
    }

    Ok((key.to_string(), value.trim().to_string()))
}
