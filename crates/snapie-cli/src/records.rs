//! # Queue Inspection Subcommands
//!
//! Read-only views of what the background jobs would pick up next, taken
//! straight from the PostgreSQL store named by `DATABASE_URL`.
//!
//! ```bash
//! snapie queue --limit 20     # due for migration
//! snapie expired              # ephemeral pins past pin_until
//! ```

use anyhow::{Context, Result};
use clap::Args;
use sqlx::postgres::PgPoolOptions;

use snapie_core::Timestamp;
use snapie_store::{AudioRecord, PgStore, RecordStore};

/// Arguments shared by the queue and expired subcommands.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum records to print.
    #[arg(long, default_value_t = 50)]
    pub limit: i64,
}

async fn connect() -> Result<PgStore> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .context("failed to connect to database")?;
    Ok(PgStore::new(pool))
}

/// Records awaiting migration whose cool-down has passed.
pub async fn run_queue(args: &ListArgs) -> Result<u8> {
    let store = connect().await?;
    let due = store.migration_queue(Timestamp::now(), args.limit).await?;
    print!("{}", render_records(&due, |r| r.lifecycle.migration_queued_at));
    println!("{} record(s) due for migration", due.len());
    Ok(0)
}

/// Ephemeral records whose pin has lapsed.
pub async fn run_expired(args: &ListArgs) -> Result<u8> {
    let store = connect().await?;
    let expired = store.expired_pins(Timestamp::now(), args.limit).await?;
    print!("{}", render_records(&expired, |r| r.lifecycle.pin_until));
    println!("{} record(s) with expired pins", expired.len());
    Ok(0)
}

/// One line per record: permlink, owner, status pair, the deadline column
/// picked by `deadline`, then the CID.
pub fn render_records(
    records: &[AudioRecord],
    deadline: impl Fn(&AudioRecord) -> Option<Timestamp>,
) -> String {
    records
        .iter()
        .map(|r| {
            let when = deadline(r).map_or_else(|| "-".to_string(), |t| t.to_iso8601());
            format!(
                "{:<10} {:<20} {}/{:<12} {:<20} {}\n",
                r.permlink().as_str(),
                r.owner.as_str(),
                r.lifecycle.ipfs_status.as_str(),
                r.lifecycle.migration_status.as_str(),
                when,
                r.content_id(),
            )
        })
        .collect()
}
