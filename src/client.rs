//! Session: the document API on top of the HTTP transport.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;
use tracing::{debug, trace};

use crate::connection::{ConnectionFactory, DnsResolver, Resolver};
use crate::error::{Error, Result};
use crate::http::{json_decoder, Body, TransactionFactory};
use crate::protocol::{check_error, store_message, Document, QueryResult};
use crate::query::{Query, Template};

/// Port the Higgla server listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 4567;

/// Default `User-Agent` header
pub const USER_AGENT: &str = concat!("higgla-rs/", env!("CARGO_PKG_VERSION"));

/// Session options
#[derive(Debug, Clone)]
pub struct SessionOptions {
  pub host: String,
  pub port: u16,
  pub base: String,
  pub user_agent: String,
}

impl SessionOptions {
  pub fn new(host: impl Into<String>, port: u16, base: impl Into<String>) -> Self {
    Self {
      host: host.into(),
      port,
      base: base.into(),
      user_agent: USER_AGENT.to_string(),
    }
  }

  pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
    self.user_agent = user_agent.into();
    self
  }
}

impl Default for SessionOptions {
  fn default() -> Self {
    Self::new("localhost", DEFAULT_PORT, "default")
  }
}

/// HTTP methods used by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
  Put,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A session against one base on one Higgla server.
///
/// Holds no state besides that binding: every call opens its own connection
/// and performs one request/response exchange. Failures are returned as-is,
/// never retried. In particular a [`Error::VersionConflict`] must be handled
/// by re-reading the box before storing again.
pub struct Session<R = DnsResolver> {
  base: String,
  path: String,
  user_agent: String,
  transactions: TransactionFactory<R>,
}

impl Session {
  /// Create a session for `base` on `host:port`. No connection is made until
  /// the first request.
  pub fn new(host: impl Into<String>, port: u16, base: impl Into<String>) -> Result<Self> {
    Self::with_options(SessionOptions::new(host, port, base))
  }

  pub fn with_options(opts: SessionOptions) -> Result<Self> {
    Self::with_resolver(opts, DnsResolver)
  }
}

impl<R: Resolver> Session<R> {
  /// Create a session that resolves the server's host with `resolver`
  pub fn with_resolver(opts: SessionOptions, resolver: R) -> Result<Self> {
    if opts.base.is_empty() {
      return Err(Error::invalid("Base name must not be empty"));
    }
    let connections = ConnectionFactory::with_resolver(opts.host, opts.port, resolver);
    Ok(Self {
      path: format!("/{}", urlencoding::encode(&opts.base)),
      base: opts.base,
      user_agent: opts.user_agent,
      transactions: TransactionFactory::with_connections(connections, Some(json_decoder)),
    })
  }

  pub fn base(&self) -> &str {
    &self.base
  }

  pub fn transactions(&self) -> &TransactionFactory<R> {
    &self.transactions
  }

  /// Prepare a box for [`store`](Self::store).
  ///
  /// `revision` is the revision last seen for the box, 0 for a new box. It
  /// must match the server's current revision or the store is rejected with
  /// [`Error::VersionConflict`]. `index` names the fields the server should
  /// index; they need not be present in `fields`.
  pub fn prepare_box<I, N, F, K, V>(&self, id: impl Into<String>, revision: u64, index: I, fields: F) -> Result<Document>
  where
    I: IntoIterator<Item = N>,
    N: Into<String>,
    F: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
  {
    let mut doc = Document::new(id, revision)?;
    for field in index {
      doc.add_index(field)?;
    }
    for (field, value) in fields {
      doc.insert(field, value)?;
    }
    Ok(doc)
  }

  /// Prepare a query, seeded with one template when `filters` is non-empty.
  pub fn prepare_query<F, K, V>(&self, filters: F) -> Query
  where
    F: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
  {
    let template: Template = filters.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    let mut query = Query::new();
    if !template.is_empty() {
      query = query.template(template);
    }
    query
  }

  /// Look up boxes by id.
  pub async fn get<I, S>(&self, ids: I) -> Result<Value>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
    if ids.is_empty() {
      return Err(Error::invalid("No ids to look up"));
    }
    if ids.iter().any(String::is_empty) {
      return Err(Error::invalid("Box id must not be empty"));
    }
    self.exchange(Method::Get, &self.path, Body::json(&ids)?, &[]).await
  }

  /// Store a batch of boxes.
  pub async fn store(&self, boxes: &[Document]) -> Result<Value> {
    let message = store_message(boxes)?;
    self.exchange(Method::Post, &self.path, Body::json(&message)?, boxes).await
  }

  /// Send one or more named queries in a single request and return the raw
  /// response.
  pub async fn send_query<'q, I, K>(&self, queries: I) -> Result<Value>
  where
    I: IntoIterator<Item = (K, &'q Query)>,
    K: Into<String>,
  {
    let message = named_queries(queries)?;
    self.exchange(Method::Get, &self.path, Body::json(&message)?, &[]).await
  }

  /// Like [`send_query`](Self::send_query), decoding each named result.
  pub async fn query<'q, I, K>(&self, queries: I) -> Result<HashMap<String, QueryResult>>
  where
    I: IntoIterator<Item = (K, &'q Query)>,
    K: Into<String>,
  {
    let reply = self.send_query(queries).await?;
    Ok(serde_json::from_value(reply)?)
  }

  /// Count the boxes matching each named query.
  pub async fn count<'q, I, K>(&self, queries: I) -> Result<HashMap<String, u64>>
  where
    I: IntoIterator<Item = (K, &'q Query)>,
    K: Into<String>,
  {
    let message: BTreeMap<String, &[Template]> = named_queries(queries)?
      .into_iter()
      .map(|(name, query)| (name, query.templates()))
      .collect();
    let path = format!("{}/count", self.path);
    let reply = self.exchange(Method::Get, &path, Body::json(&message)?, &[]).await?;
    Ok(serde_json::from_value(reply)?)
  }

  /// Expert: send a free form message and return the decoded response.
  ///
  /// Structured messages are sent as JSON, text is sent verbatim. The
  /// response is still checked for an embedded error.
  pub async fn send(&self, method: Method, path: &str, message: impl Into<Body>) -> Result<Value> {
    self.exchange(method, path, message.into(), &[]).await
  }

  async fn exchange(&self, method: Method, path: &str, body: Body, submitted: &[Document]) -> Result<Value> {
    let payload = body.to_text()?;
    let length = payload.len().to_string();

    let mut headers = vec![("User-Agent", self.user_agent.as_str())];
    if body.is_json() {
      headers.push(("Content-Type", "application/json"));
    }
    if !payload.is_empty() {
      headers.push(("Content-Length", length.as_str()));
    }

    let mut tx = self.transactions.create().await?;
    debug!(%method, path, bytes = payload.len(), "sending request");
    tx.send_request(method.as_str(), path, &headers, &Body::Text(payload)).await?;

    let response = tx.read_response().await?;
    trace!(status = response.status(), "received response");

    let reply = response.into_json().await?;
    check_error(&reply, submitted)?;
    Ok(reply)
  }
}

fn named_queries<'q, I, K>(queries: I) -> Result<BTreeMap<String, &'q Query>>
where
  I: IntoIterator<Item = (K, &'q Query)>,
  K: Into<String>,
{
  let mut named = BTreeMap::new();
  for (name, query) in queries {
    let name = name.into();
    if name.is_empty() || name.starts_with('_') {
      return Err(Error::invalid(format!(
        "Query name '{}' must be non-empty and not start with '_'",
        name
      )));
    }
    query.validate()?;
    if named.insert(name.clone(), query).is_some() {
      return Err(Error::invalid(format!("Query name '{}' used twice", name)));
    }
  }
  if named.is_empty() {
    return Err(Error::invalid("No queries in request"));
  }
  Ok(named)
}
