mod bags;
mod base;
mod binance;
mod ledger;
mod market;
mod report;

use std::path::PathBuf;

use anyhow::{bail, Error, Result};
use clap::Parser;

use base::{load_state, save_state, LedgerBook};

#[derive(Parser)]
#[command(name = "bagtally")]
#[command(about = "Crypto trade profit and bag reconciliation", version)]
struct Cli {
    /// Trade history export (CSV, newest trade first)
    trades: Option<PathBuf>,

    /// Resume from a previously saved ledger state instead of starting empty
    #[arg(long, value_name = "STATE")]
    resume: Option<PathBuf>,

    /// The export lists oldest trades first; stack rows onto the front of
    /// each pair's history instead of reversing the file
    #[arg(long)]
    oldest_first: bool,

    /// Skip rows that fail to process instead of aborting
    #[arg(long)]
    skip_bad_rows: bool,

    /// Write the ledger state as JSON after processing
    #[arg(long, value_name = "FILE")]
    save_state: Option<PathBuf>,

    /// Write the per-pair report as CSV
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.trades.is_none() && cli.resume.is_none() {
        bail!("nothing to do: pass a trade history CSV and/or --resume a saved state");
    }

    let mut book = match &cli.resume {
        Some(path) => load_state(path)?,
        None => LedgerBook::default(),
    };

    if let Some(path) = &cli.trades {
        let trades = binance::load_trade_history_csv(path, !cli.oldest_first)?;
        println!("Loaded {} trades from {}", trades.len(), path.display());

        for (index, trade) in trades.into_iter().enumerate() {
            if let Err(err) = book.record(trade, cli.oldest_first) {
                if cli.skip_bad_rows {
                    println!("warning: skipping row {}: {}", index + 1, err);
                } else {
                    return Err(Error::new(err).context(format!("row {}", index + 1)));
                }
            }
        }
    }

    bags::reconcile_bags(&mut book);
    report::summarize_profit(&mut book);
    report::print_summary(&book);

    if let Some(path) = &cli.export {
        report::save_report_to_csv(&book, path)?;
    }
    if let Some(path) = &cli.save_state {
        save_state(&book, path)?;
    }

    Ok(())
}
