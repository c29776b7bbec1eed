//! Stats command - Queue depth and archive counts per kind

use clap::Args;
use orgsync_engine::{OperationQueue, QueueStats};

use crate::error::CliResult;

/// Arguments for the stats command
#[derive(Args)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the stats command
pub async fn execute(args: StatsArgs) -> CliResult<()> {
    let (_, pool) = super::connect().await?;
    let stats = OperationQueue::new(pool.clone()).stats().await?;
    pool.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render(&stats));
    }
    Ok(())
}

fn render(stats: &QueueStats) -> String {
    let mut out = format!(
        "{:<10} {:>10} {:>10} {:>10}\n",
        "KIND", "PENDING", "SUCCEEDED", "FAILED"
    );
    for kind in &stats.kinds {
        out.push_str(&format!(
            "{:<10} {:>10} {:>10} {:>10}\n",
            kind.kind.to_string(),
            kind.pending,
            kind.succeeded,
            kind.failed
        ));
    }
    out
}
