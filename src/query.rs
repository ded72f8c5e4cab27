//! Query builder for Higgla
//!
//! A query is a list of templates. Each template maps field names to the
//! values a box must carry in those fields; how the server combines several
//! templates is up to the server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One equality filter: field name to expected value
pub type Template = Map<String, Value>;

/// Query sent over the wire as `{"_templates": [...], "_count": n, "_offset": n}`
///
/// # Example
/// ```
/// use higgla::Query;
///
/// let query = Query::new()
///     .template([("firstname", "mikkel")])
///     .template([("lastname", "kamstrup")])
///     .count(10)
///     .offset(20);
/// assert_eq!(query.templates().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "_templates", default)]
    templates: Vec<Template>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
    #[serde(rename = "_offset", default, skip_serializing_if = "Option::is_none")]
    offset: Option<u32>,
}

impl Query {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template built from `(field, value)` pairs
    pub fn template<I, K, V>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.templates
            .push(filters.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Add a template given as a JSON value. Anything but an object is rejected.
    pub fn add_template(&mut self, template: Value) -> Result<&mut Self> {
        match template {
            Value::Object(map) => {
                self.templates.push(map);
                Ok(self)
            }
            other => Err(Error::invalid(format!(
                "Query template must be an object, found {}",
                other
            ))),
        }
    }

    /// Return at most `n` boxes
    pub fn count(mut self, n: u32) -> Self {
        self.count = Some(n);
        self
    }

    /// Skip the first `n` matches
    pub fn offset(mut self, n: u32) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn result_count(&self) -> Option<u32> {
        self.count
    }

    pub fn result_offset(&self) -> Option<u32> {
        self.offset
    }

    /// Check the query is something the server will accept.
    pub fn validate(&self) -> Result<()> {
        if self.templates.is_empty() {
            return Err(Error::invalid("Query has no templates"));
        }
        if self.count == Some(0) {
            return Err(Error::invalid("Query count must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let query = Query::new()
            .template([("firstname", "mikkel")])
            .count(10)
            .offset(5);
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"_templates": [{"firstname": "mikkel"}], "_count": 10, "_offset": 5})
        );
    }

    #[test]
    fn test_pagination_omitted_when_unset() {
        let query = Query::new().template([("age", 30)]);
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"_templates": [{"age": 30}]})
        );
    }

    #[test]
    fn test_add_template() {
        let mut query = Query::new();
        query.add_template(json!({"a": 1})).unwrap().add_template(json!({"b": 2})).unwrap();
        assert_eq!(query.templates().len(), 2);

        let err = query.add_template(json!(["not", "a", "map"])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(query.templates().len(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(Query::new().validate().is_err());
        assert!(Query::new().template([("a", 1)]).count(0).validate().is_err());
        assert!(Query::new().template([("a", 1)]).offset(0).validate().is_ok());
    }
}
