//! Connection acquisition with a last-good-address cache.
//!
//! Every request opens its own TCP connection. Name resolution is only
//! repeated when the address that worked last time stops accepting
//! connections.

use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Turns a host name and port into candidate socket addresses.
pub trait Resolver: Send + Sync {
    /// Resolve `host:port`, returning candidates in the order they should be tried.
    fn resolve<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, io::Result<Vec<SocketAddr>>>;
}

/// System name resolution through `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

impl Resolver for DnsResolver {
    fn resolve<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, io::Result<Vec<SocketAddr>>> {
        async move {
            let addrs = tokio::net::lookup_host((host, port)).await?;
            Ok::<_, io::Error>(addrs.collect())
        }
        .boxed()
    }
}

/// Opens connections to one `host:port`, remembering the last address that
/// accepted a connection.
pub struct ConnectionFactory<R = DnsResolver> {
    host: String,
    port: u16,
    resolver: R,
    cached: Mutex<Option<SocketAddr>>,
}

impl ConnectionFactory {
    /// Create a factory using system name resolution.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_resolver(host, port, DnsResolver)
    }
}

impl<R: Resolver> ConnectionFactory<R> {
    /// Create a factory with a custom resolver
    pub fn with_resolver(host: impl Into<String>, port: u16, resolver: R) -> Self {
        Self {
            host: host.into(),
            port,
            resolver,
            cached: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address the last successful connection went to, if any.
    pub fn cached_addr(&self) -> Option<SocketAddr> {
        *self.cache()
    }

    /// Forget the cached address; the next `connect` resolves again.
    pub fn clear_cache(&self) {
        *self.cache() = None;
    }

    fn cache(&self) -> MutexGuard<'_, Option<SocketAddr>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new connection.
    ///
    /// Tries the cached address first. If there is none, or it refuses the
    /// connection, the host is resolved again and every candidate is tried in
    /// order. The first candidate that connects replaces the cached address.
    /// Failures are never retried here.
    pub async fn connect(&self) -> Result<TcpStream> {
        if let Some(addr) = self.cached_addr() {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    trace!(%addr, "connected to cached address");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(%addr, error = %e, "cached address failed, resolving {}:{} again", self.host, self.port);
                }
            }
        }

        let candidates = self
            .resolver
            .resolve(&self.host, self.port)
            .await
            .map_err(|e| Error::Connection(format!("Failed to resolve {}:{}: {}", self.host, self.port, e)))?;

        if candidates.is_empty() {
            return Err(Error::Connection(format!(
                "No addresses found for {}:{}",
                self.host, self.port
            )));
        }

        let mut last_err = None;
        for addr in candidates {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!(%addr, "connected to {}:{}", self.host, self.port);
                    *self.cache() = Some(addr);
                    return Ok(stream);
                }
                Err(e) => {
                    trace!(%addr, error = %e, "candidate address failed");
                    last_err = Some(e);
                }
            }
        }

        Err(Error::Connection(format!(
            "Failed to connect to {}:{}: {}",
            self.host,
            self.port,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}
