//! Wire protocol types for Higgla.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Box id key
pub const ID_KEY: &str = "_id";

/// Box revision key
pub const REV_KEY: &str = "_rev";

/// Indexed field names key
pub const INDEX_KEY: &str = "_index";

/// Keys owned by the protocol; never usable as application fields
pub const RESERVED_KEYS: [&str; 3] = [ID_KEY, REV_KEY, INDEX_KEY];

/// Error discriminator for optimistic-concurrency failures
pub const CONFLICT: &str = "conflict";

/// A box: a versioned document with an id, a revision, a list of fields the
/// server should index, and arbitrary application fields.
///
/// Revision 0 means the box does not exist yet. A store only succeeds when
/// the revision matches the server's current revision for the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  #[serde(rename = "_id")]
  id: String,
  #[serde(rename = "_rev", default)]
  rev: u64,
  #[serde(rename = "_index", default)]
  index: Vec<String>,
  #[serde(flatten)]
  fields: Map<String, Value>,
}

impl Document {
  pub fn new(id: impl Into<String>, rev: u64) -> Result<Self> {
    let id = id.into();
    if id.is_empty() {
      return Err(Error::invalid("Box id must not be empty"));
    }
    Ok(Self {
      id,
      rev,
      index: Vec::new(),
      fields: Map::new(),
    })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn rev(&self) -> u64 {
    self.rev
  }

  pub fn index(&self) -> &[String] {
    &self.index
  }

  pub fn fields(&self) -> &Map<String, Value> {
    &self.fields
  }

  pub fn get(&self, field: &str) -> Option<&Value> {
    self.fields.get(field)
  }

  /// Set an application field, returning the previous value.
  pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
    let field = field.into();
    if RESERVED_KEYS.contains(&field.as_str()) {
      return Err(Error::invalid(format!("'{}' is a reserved box key", field)));
    }
    Ok(self.fields.insert(field, value.into()))
  }

  pub fn remove(&mut self, field: &str) -> Option<Value> {
    self.fields.remove(field)
  }

  /// Ask the server to index `field`.
  pub fn add_index(&mut self, field: impl Into<String>) -> Result<()> {
    let field = field.into();
    if field.is_empty() {
      return Err(Error::invalid("Index field name must not be empty"));
    }
    if RESERVED_KEYS.contains(&field.as_str()) {
      return Err(Error::invalid(format!("'{}' is a reserved box key", field)));
    }
    if !self.index.contains(&field) {
      self.index.push(field);
    }
    Ok(())
  }

  pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
    self.insert(field, value)?;
    Ok(self)
  }

  pub fn with_index(mut self, field: impl Into<String>) -> Result<Self> {
    self.add_index(field)?;
    Ok(self)
  }
}

/// Result of one named query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
  /// Number of boxes returned
  #[serde(rename = "_count", default)]
  pub count: u64,
  /// Number of boxes matching the query
  #[serde(rename = "_total", default)]
  pub total: u64,
  #[serde(rename = "_data", default)]
  pub data: Vec<Document>,
}

/// Store envelope: boxes keyed by id. Ids must be unique within one batch.
pub(crate) fn store_message(boxes: &[Document]) -> Result<BTreeMap<&str, &Document>> {
  if boxes.is_empty() {
    return Err(Error::invalid("No boxes to store"));
  }
  let mut message = BTreeMap::new();
  for doc in boxes {
    if message.insert(doc.id(), doc).is_some() {
      return Err(Error::invalid(format!("Box '{}' appears twice in one store", doc.id())));
    }
  }
  Ok(message)
}

/// Turn a response carrying an `error` field into an [`Error`].
///
/// `"conflict"` maps to [`Error::VersionConflict`], any other message to
/// [`Error::Server`]. A list of error reports (a rejected batch) is a
/// conflict when any report is one. `submitted` are the boxes the request
/// carried; they supply the revision the caller expected. Without a matching
/// box the report's own `_rev` is used.
pub fn check_error(response: &Value, submitted: &[Document]) -> Result<()> {
  let Some(error) = response.as_object().and_then(|o| o.get("error")) else {
    return Ok(());
  };

  match error {
    Value::String(msg) if msg == CONFLICT => Err(conflict(response, submitted)),
    Value::String(msg) => Err(Error::Server(msg.clone())),
    Value::Array(reports) => match reports.iter().find(|r| is_conflict(r)) {
      Some(report) => Err(conflict(report, submitted)),
      None => Err(Error::Server(
        reports.iter().map(describe).collect::<Vec<_>>().join("; "),
      )),
    },
    other => Err(Error::Server(other.to_string())),
  }
}

fn is_conflict(report: &Value) -> bool {
  report.get("error").and_then(Value::as_str) == Some(CONFLICT)
}

fn report_id(report: &Value) -> Option<&str> {
  report
    .get(ID_KEY)
    .or_else(|| report.get("__id__"))
    .and_then(Value::as_str)
}

fn report_rev(report: &Value) -> Option<u64> {
  report
    .get(REV_KEY)
    .or_else(|| report.get("__rev__"))
    .and_then(Value::as_u64)
}

fn describe(report: &Value) -> String {
  let msg = match report.get("error") {
    Some(Value::String(msg)) => msg.clone(),
    Some(other) => other.to_string(),
    None => report.to_string(),
  };
  match report_id(report) {
    Some(id) => format!("{}: {}", id, msg),
    None => msg,
  }
}

fn conflict(report: &Value, submitted: &[Document]) -> Error {
  let id = report_id(report)
    .map(str::to_string)
    .or_else(|| match submitted {
      [only] => Some(only.id().to_string()),
      _ => None,
    })
    .unwrap_or_default();

  let expected_revision = submitted
    .iter()
    .find(|doc| doc.id() == id)
    .map(Document::rev)
    .or_else(|| report_rev(report))
    .unwrap_or_default();

  Error::VersionConflict { id, expected_revision }
}
