// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Target URL normalization
//!
//! Turns user input such as `example.com`, `https://example.com/api` or
//! `example.com:8000/path` into a host, port, path and resolved IP address.

use serde::Serialize;
use std::net::IpAddr;
use tracing::debug;
use url::Url;

use crate::error::TargetError;

/// Normalized URL before DNS resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl TargetUrl {
    /// Parse and normalize a raw URL. Does no I/O.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let raw = raw.trim();
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        let url = Url::parse(&with_scheme).map_err(|source| TargetError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TargetError::MissingHost(raw.to_string()))?;
        // IPv6 literals come back bracketed
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();

        let port = match url.port() {
            Some(port) => port,
            None => match url.scheme() {
                "https" => 443,
                "http" => 80,
                scheme => {
                    return Err(TargetError::UnknownPort {
                        scheme: scheme.to_string(),
                        url: raw.to_string(),
                    });
                }
            },
        };

        Ok(Self {
            host,
            port,
            path: normalize_path(url.path()),
        })
    }
}

/// Collapse duplicate slashes and drop a trailing slash, keeping `/` for the root
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// The thing being diagnosed. Built once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub host: String,
    pub path: String,
    pub port: u16,
    pub ip: IpAddr,
}

impl Target {
    pub fn new(url: TargetUrl, ip: IpAddr) -> Self {
        Self {
            host: url.host,
            path: url.path,
            port: url.port,
            ip,
        }
    }

    /// Parse `raw` and resolve its host to an IP address
    pub async fn resolve(raw: &str) -> Result<Self, TargetError> {
        let url = TargetUrl::parse(raw)?;
        let ip = resolve_host(&url.host, url.port).await?;
        debug!(host = %url.host, ip = %ip, "Resolved target host");
        Ok(Self::new(url, ip))
    }
}

/// Resolve a host name, preferring the first IPv4 answer
async fn resolve_host(host: &str, port: u16) -> Result<IpAddr, TargetError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| TargetError::Resolve {
            host: host.to_string(),
            source,
        })?
        .map(|addr| addr.ip())
        .collect();

    pick_address(&addrs).ok_or_else(|| TargetError::NoAddress(host.to_string()))
}

fn pick_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_parse_default_ports_and_paths() {
        let cases = [
            ("google.com", "google.com", 80, "/"),
            ("https://google.com", "google.com", 443, "/"),
            ("http://google.com", "google.com", 80, "/"),
            ("http://google.com:8000", "google.com", 8000, "/"),
            ("google.com:8000", "google.com", 8000, "/"),
            ("google.com/path", "google.com", 80, "/path"),
            ("https://google.com/path", "google.com", 443, "/path"),
            ("http://google.com/path", "google.com", 80, "/path"),
            ("http://google.com:8000/path", "google.com", 8000, "/path"),
            ("google.com:8000/path", "google.com", 8000, "/path"),
        ];

        for (raw, host, port, path) in cases {
            let url = TargetUrl::parse(raw).unwrap();
            assert_eq!(url.host, host, "host for {}", raw);
            assert_eq!(url.port, port, "port for {}", raw);
            assert_eq!(url.path, path, "path for {}", raw);
        }
    }

    #[test]
    fn test_parse_normalizes_host_and_path() {
        let url = TargetUrl::parse("HTTP://Example.COM//api//v1/?q=1#frag").unwrap();
        assert_eq!(url.host, "example.com");
        assert_eq!(url.path, "/api/v1");
    }

    #[test]
    fn test_parse_unknown_scheme_without_port() {
        let err = TargetUrl::parse("gopher://example.com").unwrap_err();
        assert!(matches!(err, TargetError::UnknownPort { .. }));
    }

    #[test]
    fn test_parse_unknown_scheme_with_port() {
        let url = TargetUrl::parse("grpc://example.com:9000").unwrap();
        assert_eq!(url.port, 9000);
    }

    #[test]
    fn test_parse_ipv6_literal() {
        let url = TargetUrl::parse("http://[::1]:8080/").unwrap();
        assert_eq!(url.host, "::1");
        assert_eq!(url.port, 8080);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TargetUrl::parse("http://").is_err());
    }

    #[test]
    fn test_pick_address_prefers_ipv4() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let v4 = IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4));
        assert_eq!(pick_address(&[v6, v4]), Some(v4));
        assert_eq!(pick_address(&[v6]), Some(v6));
        assert_eq!(pick_address(&[]), None);
    }

    #[tokio::test]
    async fn test_resolve_ip_literal_skips_dns() {
        let target = Target::resolve("http://1.2.3.4:8080/health").await.unwrap();
        assert_eq!(target.ip, IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)));
        assert_eq!(target.host, "1.2.3.4");
        assert_eq!(target.port, 8080);
        assert_eq!(target.path, "/health");
    }
}
