// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for route resolution and probing
//!
//! Lookup failures (`NotFound`, `Ambiguous`) describe the cluster and end a check.
//! Probe failures describe the diagnostic apparatus itself and abort the run.

use std::fmt;
use thiserror::Error;

/// One stage of the Ingress -> Service -> Pod chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    Ingress,
    Service,
    Pod,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hop::Ingress => write!(f, "ingress"),
            Hop::Service => write!(f, "service"),
            Hop::Pod => write!(f, "pod"),
        }
    }
}

/// Result of a cardinality-checked topology query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("could not find {hop} matching {subject}")]
    NotFound { hop: Hop, subject: String },

    #[error("found {count} {hop} entries matching {subject}, expected exactly one")]
    Ambiguous {
        hop: Hop,
        subject: String,
        count: usize,
    },
}

impl LookupError {
    pub fn hop(&self) -> Hop {
        match self {
            LookupError::NotFound { hop, .. } | LookupError::Ambiguous { hop, .. } => *hop,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, LookupError::Ambiguous { .. })
    }
}

/// Terminal failure of the route resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("ambiguous ingress rules for host: {0}")]
    AmbiguousIngress(LookupError),

    #[error("no service matches ingress rule: {0}")]
    NoServiceForIngress(LookupError),

    #[error("no ingress or service matches host: {0}")]
    NoIngressOrService(LookupError),

    #[error("no pod matches service: {0}")]
    NoPodForService(LookupError),
}

impl ResolveError {
    /// The lookup failure at the hop where resolution stopped
    pub fn lookup(&self) -> &LookupError {
        match self {
            ResolveError::AmbiguousIngress(e)
            | ResolveError::NoServiceForIngress(e)
            | ResolveError::NoIngressOrService(e)
            | ResolveError::NoPodForService(e) => e,
        }
    }
}

/// Failure to open a tunnel or complete the probe request
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to open tunnel to {pod}:{port}: {reason}")]
    Setup {
        pod: String,
        port: i32,
        reason: String,
    },

    #[error("tunnel to {pod}:{port} not ready after {waited_secs}s")]
    NotReady {
        pod: String,
        port: i32,
        waited_secs: u64,
    },

    #[error("probe request to {pod}:{port} failed: {source}")]
    Transport {
        pod: String,
        port: i32,
        #[source]
        source: reqwest::Error,
    },
}

/// Rejected check registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("priority {priority} already taken by check '{existing}', cannot register '{name}'")]
    DuplicatePriority {
        priority: u32,
        existing: String,
        name: String,
    },

    #[error("check '{0}' is already registered")]
    DuplicateName(String),
}

/// Target URL could not be normalized or resolved
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid target url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target url '{0}' has no host")]
    MissingHost(String),

    #[error("cannot infer port for scheme '{scheme}' in '{url}'")]
    UnknownPort { scheme: String, url: String },

    #[error("could not resolve host '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("host '{0}' resolved to no addresses")]
    NoAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_messages_name_the_hop() {
        let err = LookupError::Ambiguous {
            hop: Hop::Ingress,
            subject: "example.com/".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "found 2 ingress entries matching example.com/, expected exactly one"
        );
        assert!(err.is_ambiguous());
        assert_eq!(err.hop(), Hop::Ingress);
    }

    #[test]
    fn test_resolve_error_exposes_lookup() {
        let lookup = LookupError::NotFound {
            hop: Hop::Pod,
            subject: "service default/web".to_string(),
        };
        let err = ResolveError::NoPodForService(lookup.clone());
        assert_eq!(err.lookup(), &lookup);
        assert!(err.to_string().starts_with("no pod matches service"));
    }

    #[test]
    fn test_check_error_duplicate_priority() {
        let err = CheckError::DuplicatePriority {
            priority: 1,
            existing: "pod-status".to_string(),
            name: "other".to_string(),
        };
        assert!(err.to_string().contains("priority 1"));
        assert!(err.to_string().contains("pod-status"));
    }
}
