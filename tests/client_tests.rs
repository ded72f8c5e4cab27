//! Client tests for Higgla Rust SDK.

use higgla::{Error, Session, SessionOptions, DEFAULT_PORT, USER_AGENT};
use tokio::net::TcpListener;

#[test]
fn test_session_options_default() {
  let opts = SessionOptions::default();
  assert_eq!(opts.host, "localhost");
  assert_eq!(opts.port, DEFAULT_PORT);
  assert_eq!(opts.port, 4567);
  assert_eq!(opts.user_agent, USER_AGENT);
}

#[test]
fn test_session_options_builder_chain() {
  let opts = SessionOptions::new("db.example.com", 9000, "people").with_user_agent("tool/1.0");

  assert_eq!(opts.host, "db.example.com");
  assert_eq!(opts.port, 9000);
  assert_eq!(opts.base, "people");
  assert_eq!(opts.user_agent, "tool/1.0");
}

#[test]
fn test_error_display() {
  let err = Error::Connection("failed to connect".to_string());
  assert_eq!(format!("{}", err), "Connection error: failed to connect");

  let err = Error::Protocol("Illegal status code 'abc'".to_string());
  assert_eq!(format!("{}", err), "Protocol error: Illegal status code 'abc'");

  let err = Error::Server("disk full".to_string());
  assert_eq!(format!("{}", err), "Server error: disk full");

  let err = Error::VersionConflict {
    id: "mke".to_string(),
    expected_revision: 4,
  };
  assert_eq!(format!("{}", err), "Expected revision 4 of box 'mke'");

  let err = Error::InvalidArgument("Box id must not be empty".to_string());
  assert!(format!("{}", err).contains("Box id"));
}

#[test]
fn test_server_error_family() {
  assert!(Error::Server("x".to_string()).is_server_error());
  assert!(Error::VersionConflict {
    id: "a".to_string(),
    expected_revision: 0
  }
  .is_server_error());
  assert!(!Error::Protocol("x".to_string()).is_server_error());
  assert!(!Error::Connection("x".to_string()).is_server_error());
}

#[test]
fn test_error_from_io() {
  let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
  let err: Error = io_err.into();
  match err {
    Error::Io(_) => {}
    _ => panic!("Expected Io error"),
  }
}

#[test]
fn test_error_from_json() {
  let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
  let err: Error = json_err.into();
  match err {
    Error::Serialization(_) => {}
    _ => panic!("Expected Serialization error"),
  }
}

#[tokio::test]
async fn test_connect_refused() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let port = listener.local_addr().unwrap().port();
  drop(listener);

  let session = Session::new("127.0.0.1", port, "mybase").unwrap();
  match session.get(["a"]).await {
    Err(Error::Connection(_)) => {}
    other => panic!("Expected Connection error, got: {:?}", other),
  }
}

#[tokio::test]
async fn test_connect_invalid_host() {
  let session = Session::new("invalid.host.that.does.not.exist", DEFAULT_PORT, "mybase").unwrap();
  let result = session.get(["a"]).await;
  assert!(matches!(result, Err(Error::Connection(_))));
}

#[tokio::test]
async fn test_invalid_arguments_fail_before_io() {
  // Nothing listens here, so reaching the network would give a Connection error
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let port = listener.local_addr().unwrap().port();
  drop(listener);
  let session = Session::new("127.0.0.1", port, "mybase").unwrap();

  assert!(matches!(
    session.get(Vec::<String>::new()).await,
    Err(Error::InvalidArgument(_))
  ));
  assert!(matches!(session.get([""]).await, Err(Error::InvalidArgument(_))));
  assert!(matches!(session.store(&[]).await, Err(Error::InvalidArgument(_))));

  let empty = session.prepare_query(Vec::<(String, String)>::new());
  assert!(matches!(
    session.send_query([("q", &empty)]).await,
    Err(Error::InvalidArgument(_))
  ));

  let q = session.prepare_query([("a", 1)]);
  assert!(matches!(
    session.count([("_q", &q)]).await,
    Err(Error::InvalidArgument(_))
  ));
}

#[test]
fn test_prepare_box() {
  let session = Session::new("localhost", DEFAULT_PORT, "mybase").unwrap();
  for (id, rev) in [("a", 0u64), ("mke", 4), ("x y", u64::MAX)] {
    let doc = session
      .prepare_box(id, rev, ["name"], [("name", "n")])
      .unwrap();
    assert_eq!(doc.id(), id);
    assert_eq!(doc.rev(), rev);
    assert_eq!(doc.index().to_vec(), vec!["name".to_string()]);
  }

  let no_index: [&str; 0] = [];
  let err = session
    .prepare_box("", 0, no_index, [("name", "n")])
    .unwrap_err();
  assert!(matches!(err, Error::InvalidArgument(_)));

  let err = session
    .prepare_box("a", 0, no_index, [("_rev", 9)])
    .unwrap_err();
  assert!(matches!(err, Error::InvalidArgument(_)));

  let no_fields: [(&str, i32); 0] = [];
  let err = session.prepare_box("a", 0, ["_id"], no_fields).unwrap_err();
  assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_prepare_query() {
  let session = Session::new("localhost", DEFAULT_PORT, "mybase").unwrap();
  assert_eq!(session.prepare_query([("firstname", "mikkel")]).templates().len(), 1);
  assert!(session
    .prepare_query(Vec::<(String, String)>::new())
    .templates()
    .is_empty());
}
