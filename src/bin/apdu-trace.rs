use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use serde_json::json;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

use apdu_rs::logging::setup_logging;
use apdu_rs::transcript::{Outcome, Transaction, group_transactions, parse_transcript};

/// Group an APDU transcript into transactions and reassemble chained responses.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Transcript file: one frame per line, '>' for commands and '<' for responses.
    transcript: PathBuf,
    /// Print transactions as JSON on stdout.
    #[arg(long)]
    json: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run_trace(&cli) {
        error!("Trace analysis failed: {:?}", e);
        process::exit(1);
    }

    Ok(())
}

fn run_trace(cli: &Cli) -> Result<()> {
    let text = std::fs::read_to_string(&cli.transcript)
        .with_context(|| format!("Failed to read transcript at: {:?}", cli.transcript))?;
    let frames = parse_transcript(&text)?;
    info!(frames = frames.len(), "Loaded transcript");

    let transcript = group_transactions(frames);

    if cli.json {
        let transactions: Vec<_> = transcript.transactions.iter().map(transaction_json).collect();
        let orphans: Vec<_> = transcript
            .orphans
            .iter()
            .map(|f| json!({ "line": f.line, "bytes": hex::encode(&f.bytes) }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "transactions": transactions, "orphans": orphans }))?
        );
        return Ok(());
    }

    println!("--------------------------------------------------------------------------------");
    for t in &transcript.transactions {
        print_transaction(t);
    }
    for orphan in &transcript.orphans {
        warn!("L:{:<4} | Orphaned Response | {}", orphan.line, hex::encode(&orphan.bytes));
    }

    let complete = transcript.transactions.iter().filter(|t| t.is_complete()).count();
    info!(
        transactions = transcript.transactions.len(),
        complete,
        orphans = transcript.orphans.len(),
        "Transcript summary"
    );
    Ok(())
}

fn print_transaction(t: &Transaction) {
    match &t.command {
        Ok(command) => info!("L:{:<4} | Request  | {}", t.request.line, command),
        Err(e) => warn!(
            "L:{:<4} | Request  | {} (unparseable: {})",
            t.request.line,
            hex::encode(&t.request.bytes),
            e
        ),
    }

    let mut followups = t.followups.iter();
    for response in &t.responses {
        info!("L:{:<4} | Frame    | {}", response.line, hex::encode(&response.bytes));
        if let Some(followup) = followups.next() {
            info!("L:{:<4} | Followup | {}", followup.line, hex::encode(&followup.bytes));
        }
    }

    match &t.outcome {
        Outcome::Complete(response) => info!("       | Response | {}", response),
        Outcome::Pending if t.responses.is_empty() => info!("       | Response | No response received."),
        outcome => warn!("       | Response | {}", outcome),
    }
    println!("--------------------------------------------------------------------------------");
}

fn transaction_json(t: &Transaction) -> serde_json::Value {
    let outcome = match &t.outcome {
        Outcome::Complete(response) => json!({
            "data": hex::encode(&response.data),
            "status": response.status,
            "success": response.is_success(),
        }),
        Outcome::Pending => json!("incomplete"),
        Outcome::Failed(e) => json!({ "error": e.to_string() }),
    };

    json!({
        "line": t.request.line,
        "request": hex::encode(&t.request.bytes),
        "command": t.command.as_ref().ok().map(|c| c.to_string()),
        "followups": t.followups.iter().map(|f| hex::encode(&f.bytes)).collect::<Vec<_>>(),
        "responses": t.responses.iter().map(|f| hex::encode(&f.bytes)).collect::<Vec<_>>(),
        "outcome": outcome,
    })
}
