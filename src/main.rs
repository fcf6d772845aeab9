// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use cli::Args;
use k8sorm::config::{Config, EngineConfig};
use k8sorm::kubernetes::{Cluster, ClusterRegistry, StaticSource};
use k8sorm::query::FilterMode;
use output::QueryResult;

/// Cluster id of the documents loaded from the command line
const LOCAL_CLUSTER: &str = "local";

/// Initialize logging to stderr
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let filter = if verbose { "k8sorm=debug" } else { "k8sorm=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let queries = read_queries(&args)?;
    let engine = engine_config(&args)?;

    let mut source = StaticSource::new();
    for path in &args.inputs {
        source
            .load_file(path)
            .await
            .with_context(|| format!("Failed to load documents from {}", path.display()))?;
    }
    info!(documents = source.len(), files = args.inputs.len(), "documents loaded");

    let clusters = ClusterRegistry::new();
    let cluster = clusters.register(Cluster::with_config(LOCAL_CLUSTER, Arc::new(source), engine))?;

    for sql in queries {
        let normalized = sql.trim().trim_end_matches(';').to_uppercase();

        // SHOW TABLES lists the known resource types
        if normalized == "SHOW TABLES" {
            let result = QueryResult::resources(cluster.registry());
            println!("{}", result.format(args.output, args.no_headers));
            continue;
        }

        match run_query(&cluster, &sql, &args).await {
            Ok(result) => println!("{}", result.format(args.output, args.no_headers)),
            Err(e) => {
                eprintln!("Error executing query: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_query(cluster: &Arc<Cluster>, sql: &str, args: &Args) -> Result<QueryResult> {
    let mut query = cluster.query().sql(sql);
    if let Some(namespace) = &args.namespace {
        query = query.namespace(namespace);
    }
    let columns = query.columns().to_vec();
    let result = query.list().await?;
    if result.items.len() < result.total {
        info!(shown = result.items.len(), total = result.total, "result truncated by LIMIT/OFFSET");
    }
    Ok(QueryResult::from_documents(&columns, &result.items))
}

/// The `-q` query, or every non-comment line of the `-f` file
fn read_queries(args: &Args) -> Result<Vec<String>> {
    if let Some(query) = &args.query {
        return Ok(vec![query.clone()]);
    }
    let Some(file) = &args.file else {
        bail!("no query given, use -q or -f");
    };
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read query file {}", file.display()))?;
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.trim().starts_with("--"))
        .map(String::from)
        .collect())
}

/// Config file settings with command line flags on top
fn engine_config(args: &Args) -> Result<EngineConfig> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Could not load config, using defaults: {:#}", e);
            Config::default()
        }),
    };

    let mut engine = config.engine;
    if let Some(ttl) = args.cache_ttl {
        engine.cache_ttl_secs = ttl;
    }
    if args.lenient {
        engine.lenient_where = true;
    }
    if args.grouped {
        engine.filter_mode = FilterMode::Grouped;
    }
    Ok(engine)
}
