//! # Fetch Subcommand
//!
//! Fetch a CID through the public gateways with fallback and write the
//! bytes to a file. The local gateway is never used: this is the path a
//! direct-CID request takes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use snapie_core::ContentId;
use snapie_ipfs::{fetch_with_fallback, resolve_gateways, Fetched, GatewayConfig, HttpGatewayFetcher};

/// Arguments for the fetch subcommand.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Content identifier to fetch.
    pub cid: String,

    /// File to write the content to.
    #[arg(short, long)]
    pub output: PathBuf,
}

pub async fn run_fetch(args: &FetchArgs) -> Result<u8> {
    let config = GatewayConfig::from_env().context("failed to load gateway configuration")?;
    let fetched = fetch_to_file(&config, args.cid.trim(), &args.output).await?;
    println!("  source:  {} ({})", fetched.source_index, fetched.url);
    println!("  bytes:   {}", fetched.bytes.len());
    println!("  written: {}", args.output.display());
    Ok(0)
}

/// Resolve, fetch and write. Returns the winning attempt.
pub async fn fetch_to_file(config: &GatewayConfig, cid: &str, output: &Path) -> Result<Fetched> {
    let cid = ContentId::parse(cid)?;
    let candidates = resolve_gateways(config, &cid, None);
    let fetched = fetch_with_fallback(
        &HttpGatewayFetcher::default(),
        &candidates,
        config.fetch_timeout(),
    )
    .await
    .with_context(|| format!("failed to fetch {cid}"))?;

    std::fs::write(output, &fetched.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(fetched)
}
