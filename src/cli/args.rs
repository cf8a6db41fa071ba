// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "netkat")]
#[command(
    author,
    version,
    about = "Troubleshoot Kubernetes networking: trace a URL to its pods and check they are listening"
)]
pub struct Args {
    /// Target URL, e.g. example.com, https://example.com/api, example.com:8080/path
    #[arg(value_name = "URL")]
    pub target: String,

    /// Kubernetes context name (default: current context)
    #[arg(short, long, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Kubernetes config file (default: $KUBECONFIG or $HOME/.kube/config)
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// HTTP path requested from each pod (default: /)
    #[arg(long, value_name = "PATH")]
    pub probe_path: Option<String>,

    /// Seconds to wait for a pod tunnel to become ready, 0 waits forever (default: 30)
    #[arg(long, value_name = "SECS")]
    pub tunnel_timeout: Option<u64>,

    /// Seconds to wait for the probe response (default: 10)
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_target_is_required() {
        assert!(Args::try_parse_from(["netkat"]).is_err());
    }

    #[test]
    fn test_parse_all_flags() {
        let args = Args::try_parse_from([
            "netkat",
            "https://example.com/api",
            "-c",
            "prod",
            "--kubeconfig",
            "/tmp/kubeconfig",
            "-o",
            "json",
            "--probe-path",
            "/healthz",
            "--tunnel-timeout",
            "5",
            "--request-timeout",
            "2",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.target, "https://example.com/api");
        assert_eq!(args.context.as_deref(), Some("prod"));
        assert_eq!(args.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.probe_path.as_deref(), Some("/healthz"));
        assert_eq!(args.tunnel_timeout, Some(5));
        assert_eq!(args.request_timeout, Some(2));
        assert!(args.verbose);
    }

    #[test]
    fn test_output_defaults_to_text() {
        let args = Args::try_parse_from(["netkat", "example.com"]).unwrap();
        assert_eq!(args.output, OutputFormat::Text);
        assert!(!args.verbose);
    }
}
