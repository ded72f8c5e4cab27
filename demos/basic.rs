//! Basic example demonstrating Higgla Rust SDK usage.
//!
//! Expects a Higgla server on localhost:4567. Set `RUST_LOG=higgla=trace`
//! to see the transport at work.

use higgla::{Error, Session};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> higgla::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let session = Session::new("localhost", higgla::DEFAULT_PORT, "mybase")?;

  println!("LOOKUP mke AND mydoc2 RESULTS");
  match session.get(["mke", "mydoc2"]).await {
    Ok(found) => println!("{}", found),
    Err(e) => println!("Error: {}", e),
  }
  println!();

  println!("STORE RESULTS");
  let mut doc = session.prepare_box(
    "mke",
    0,
    ["firstname"],
    [("firstname", "Mikkel"), ("lastname", "Kamstrup")],
  )?;
  doc.insert("address", "57 Mount Pleasant Street")?;
  match session.store(&[doc]).await {
    Ok(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
    Err(Error::VersionConflict { id, expected_revision }) => {
      println!("Conflict: '{}' is no longer at revision {}", id, expected_revision)
    }
    Err(e) => println!("Error: {}", e),
  }
  println!();

  println!("QUERY RESULTS");
  let query = session.prepare_query([("firstname", "mikkel")]);
  let reply = session.send_query([("myquery", &query)]).await?;
  println!("{}", serde_json::to_string_pretty(&reply)?);

  Ok(())
}
