//! # CID and Gateway Subcommands
//!
//! ```bash
//! snapie cid QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG   # prints v0
//! snapie gateways <cid> --ipfs-status pinned_local
//! ```

use anyhow::{Context, Result};
use clap::Args;
use url::Url;

use snapie_core::cid::classify;
use snapie_core::ContentId;
use snapie_ipfs::{resolve_gateways, GatewayConfig};
use snapie_state::IpfsStatus;

/// Arguments for the cid subcommand.
#[derive(Args, Debug)]
pub struct CidArgs {
    /// Value to classify.
    pub value: String,
}

/// Arguments for the gateways subcommand.
#[derive(Args, Debug)]
pub struct GatewaysArgs {
    /// Content identifier to resolve.
    pub cid: String,

    /// Treat the CID as belonging to a record in this state
    /// (pinned_local, migrating, migrated, expired). Omit for a direct CID.
    #[arg(long)]
    pub ipfs_status: Option<IpfsStatus>,
}

/// Print `v0`/`v1`; exit 1 for anything else.
pub fn run_cid(args: &CidArgs) -> Result<u8> {
    match classify(args.value.trim()) {
        Some(version) => {
            println!("{version}");
            Ok(0)
        }
        None => {
            eprintln!("invalid CID: {}", args.value);
            Ok(1)
        }
    }
}

/// Print the candidate URLs in the order a stream request would try them.
pub fn run_gateways(args: &GatewaysArgs) -> Result<u8> {
    let config = GatewayConfig::from_env().context("failed to load gateway configuration")?;
    let cid = ContentId::parse(args.cid.trim())?;
    let candidates = resolve_gateways(&config, &cid, args.ipfs_status);
    tracing::debug!(cid = %cid, candidates = candidates.len(), "resolved gateways");
    print!("{}", render_candidates(&candidates));
    Ok(0)
}

/// One `index  url` line per candidate.
pub fn render_candidates(candidates: &[Url]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, url)| format!("{i}  {url}\n"))
        .collect()
}
