// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "k8sorm")]
#[command(author, version, about = "Query Kubernetes resource documents using SQL")]
pub struct Args {
    /// Execute a SQL query directly
    #[arg(short, long)]
    pub query: Option<String>,

    /// Execute queries from a file, one per line. Lines starting with `--` are skipped.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Documents to query: `kubectl get -o json|yaml` output, List objects or
    /// multi-document YAML. Repeatable.
    #[arg(short, long = "input", value_name = "PATH", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Restrict queries to one namespace ("*" for all, the default)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Omit column headers in output
    #[arg(long)]
    pub no_headers: bool,

    /// Cache list results for this many seconds
    #[arg(long, value_name = "SECS")]
    pub cache_ttl: Option<u64>,

    /// Skip unsupported WHERE expressions instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Evaluate WHERE as flat AND/OR groups instead of an expression tree
    #[arg(long)]
    pub grouped: bool,

    /// Config file (defaults to ~/.k8sorm/config.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let args = Args::try_parse_from(["k8sorm", "-i", "pods.yaml", "-q", "select * from pods"]).unwrap();
        assert_eq!(args.inputs, vec![PathBuf::from("pods.yaml")]);
        assert_eq!(args.query.as_deref(), Some("select * from pods"));
        assert_eq!(args.output, OutputFormat::Table);
        assert!(args.namespace.is_none());
    }

    #[test]
    fn test_parse_all_flags() {
        let args = Args::try_parse_from([
            "k8sorm", "-i", "a.json", "-i", "b.yaml", "-f", "queries.sql", "-n", "kube-system", "-o", "json",
            "--no-headers", "--cache-ttl", "30", "--lenient", "--grouped", "-v",
        ])
        .unwrap();
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.file, Some(PathBuf::from("queries.sql")));
        assert_eq!(args.namespace.as_deref(), Some("kube-system"));
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.cache_ttl, Some(30));
        assert!(args.no_headers && args.lenient && args.grouped && args.verbose);
    }

    #[test]
    fn test_inputs_required() {
        assert!(Args::try_parse_from(["k8sorm", "-q", "select * from pods"]).is_err());
    }
}
