//! Higgla Rust Client SDK
//!
//! A client for Higgla, a document store that speaks JSON over HTTP/1.0.
//! Documents ("boxes") carry an id, a revision used for optimistic
//! concurrency, a list of fields to index, and arbitrary JSON fields.
//!
//! # Example
//!
//! ```no_run
//! use higgla::{Error, Session};
//!
//! #[tokio::main]
//! async fn main() -> higgla::Result<()> {
//!     let session = Session::new("localhost", higgla::DEFAULT_PORT, "mybase")?;
//!
//!     // Store a new box (revision 0)
//!     let doc = session.prepare_box(
//!         "mke",
//!         0,
//!         ["firstname"],
//!         [("firstname", "Mikkel"), ("lastname", "Kamstrup")],
//!     )?;
//!     match session.store(&[doc]).await {
//!         Ok(reply) => println!("Stored: {}", reply),
//!         Err(Error::VersionConflict { id, expected_revision }) => {
//!             println!("{} is no longer at revision {}", id, expected_revision);
//!         }
//!         Err(e) => return Err(e),
//!     }
//!
//!     // Look boxes up by id
//!     println!("{}", session.get(["mke"]).await?);
//!
//!     // Query by template
//!     let query = session.prepare_query([("firstname", "mikkel")]).count(10);
//!     let results = session.query([("people", &query)]).await?;
//!     println!("Found {} people", results["people"].total);
//!
//!     Ok(())
//! }
//! ```

mod client;
pub mod connection;
mod error;
pub mod http;
pub mod protocol;
pub mod query;

pub use client::{Method, Session, SessionOptions, DEFAULT_PORT, USER_AGENT};
pub use connection::{ConnectionFactory, DnsResolver, Resolver};
pub use error::{Error, Result};
pub use http::{Body, HttpTransaction, Response, ResponseBody, TransactionFactory};
pub use protocol::{check_error, Document, QueryResult};
pub use query::{Query, Template};
