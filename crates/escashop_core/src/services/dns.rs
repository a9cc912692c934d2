//! IPv4-preferring host resolution.
//!
//! Some hosting environments have no IPv6 route, so connecting to an AAAA
//! answer fails with ENETUNREACH. The pool is therefore handed an IPv4
//! literal whenever the name resolves to one.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_trait::async_trait;

/// Name resolution seam used by the connection resolver.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `host` to its first IPv4 address.
    async fn lookup_ipv4(&self, host: &str) -> io::Result<Ipv4Addr>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup_ipv4(&self, host: &str) -> io::Result<Ipv4Addr> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        first_ipv4(addrs).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no IPv4 address for {host}"))
        })
    }
}

fn first_ipv4(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr.ip() {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    })
}

/// Whether `host` is already an IPv4 or IPv6 literal.
pub fn is_ip_literal(host: &str) -> bool {
    host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>().is_ok()
}
