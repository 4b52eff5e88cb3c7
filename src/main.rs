use anyhow::{Context, Result, bail};
use apdu_lib::{AssemblerState, Command, CommandHeader, Decoded, Exchange, ReplayTransport, ResponseAssembler};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use serde_json::json;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

use apdu_rs::config::load_config;
use apdu_rs::logging::setup_logging;
use apdu_rs::transcript::decode_hex;

/// Encode, decode and replay ISO 7816-4 APDUs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Print results as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,
    /// JSON file with encoder and exchange settings.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a command and print its wire bytes.
    Encode {
        #[command(flatten)]
        apdu: CommandArgs,
        /// Use extended form even when short form would do.
        #[arg(long)]
        extended: bool,
        /// Largest frame the transport accepts.
        #[arg(long)]
        frame_limit: Option<usize>,
    },
    /// Decode response frames in order, following continuations.
    Decode {
        /// Response frames as hex, oldest first.
        #[arg(required = true)]
        frames: Vec<String>,
    },
    /// Parse an encoded command back into its fields.
    Parse {
        /// Encoded command as hex.
        apdu: String,
    },
    /// Run a command against a scripted transport that replays the given responses.
    Exchange {
        #[command(flatten)]
        apdu: CommandArgs,
        /// Response frame as hex; repeat once per frame the transport should return.
        #[arg(short, long = "response", required = true)]
        responses: Vec<String>,
        /// Class byte for GET RESPONSE, as hex. Defaults to the command's own.
        #[arg(long, value_parser = parse_hex_byte)]
        get_response_cla: Option<u8>,
    },
}

#[derive(Args, Debug)]
struct CommandArgs {
    /// CLA INS P1 P2 as 8 hex digits, e.g. 00010300.
    header: String,
    /// Command data as hex.
    #[arg(short, long)]
    data: Option<String>,
    /// Expected response length, 0 for "as much as available".
    #[arg(long)]
    le: Option<u32>,
}

impl CommandArgs {
    fn to_command(&self) -> Result<Command> {
        let header_bytes = decode_hex(&self.header)?;
        if header_bytes.len() != 4 {
            bail!("Header must be exactly 4 bytes, got {}", header_bytes.len());
        }
        let mut command = Command::new(CommandHeader::try_from(header_bytes)?);
        if let Some(data) = &self.data {
            command.data = decode_hex(data)?;
        }
        command.expected_len = self.le;
        Ok(command)
    }
}

fn parse_hex_byte(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("{:?}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode {
            apdu,
            extended,
            frame_limit,
        } => {
            if extended {
                config.encoder.prefer_extended = true;
            }
            if let Some(limit) = frame_limit {
                config.encoder.frame_limit = limit;
            }
            let command = apdu.to_command()?;
            let encoded = command.encode(&config.encoder).context("Failed to encode command")?;

            if cli.json {
                print_json(&json!({
                    "apdu": hex::encode(encoded.bytes()),
                    "form": encoded.form(),
                    "length": encoded.len(),
                    "frame_limit": encoded.frame_limit(),
                    "requires_fragmentation": encoded.requires_fragmentation(),
                }))?;
            } else {
                println!("{}", hex::encode(encoded.bytes()));
                info!(
                    form = %encoded.form(),
                    len = encoded.len(),
                    requires_fragmentation = encoded.requires_fragmentation(),
                    "{}",
                    command
                );
            }
        }
        Commands::Decode { frames } => decode_frames(&frames, cli.json)?,
        Commands::Parse { apdu } => {
            let command = Command::try_from(decode_hex(&apdu)?).context("Failed to parse command")?;
            if cli.json {
                print_json(&json!({
                    "header": command.header,
                    "data": hex::encode(&command.data),
                    "expected_len": command.expected_len,
                }))?;
            } else {
                println!("{}", command);
            }
        }
        Commands::Exchange {
            apdu,
            responses,
            get_response_cla,
        } => {
            if get_response_cla.is_some() {
                config.get_response_cla = get_response_cla;
            }
            let command = apdu.to_command()?;
            let script = responses.iter().map(|r| decode_hex(r)).collect::<Result<Vec<Bytes>>>()?;
            let mut exchange = Exchange::with_config(ReplayTransport::new(script), config);

            let response = exchange.transmit(&command).await.context("Exchange failed")?;
            let sent: Vec<String> = exchange.transport().sent().iter().map(hex::encode).collect();
            let unused = exchange.transport().remaining();
            if unused > 0 {
                info!(unused, "Exchange finished before the script ran out");
            }

            if cli.json {
                print_json(&json!({
                    "sent": sent,
                    "data": hex::encode(&response.data),
                    "status": response.status,
                    "success": response.is_success(),
                }))?;
            } else {
                for frame in &sent {
                    println!("> {}", frame);
                }
                println!("{}", response);
            }
        }
    }

    Ok(())
}

fn decode_frames(frames: &[String], json_output: bool) -> Result<()> {
    let mut assembler = ResponseAssembler::new();
    let mut signals = Vec::new();

    for (i, frame) in frames.iter().enumerate() {
        let raw = decode_hex(frame)?;
        let decoded = assembler.feed(raw).with_context(|| format!("Frame {}", i))?;
        let signal = match &decoded {
            Decoded::Complete(response) => json!({
                "signal": "complete",
                "data": hex::encode(&response.data),
                "status": response.status,
            }),
            Decoded::ContinuationRequired { status, .. } => json!({
                "signal": "continuation_required",
                "received": assembler.pending_data().len(),
                "remaining": status.bytes_remaining(),
            }),
            Decoded::RetryWithLength { length, .. } => json!({
                "signal": "retry_with_length",
                "length": length,
            }),
        };
        if !json_output {
            match &decoded {
                Decoded::Complete(response) => println!("[{}] {}", i, response),
                other => println!("[{}] {}", i, other.status()),
            }
        }
        signals.push(signal);
    }

    if assembler.state() != AssemblerState::Finalized {
        info!(state = %assembler.state(), "Frames ended before the response was complete");
    }
    if json_output {
        print_json(&json!(signals))?;
    }
    Ok(())
}
