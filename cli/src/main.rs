mod apdu;

use std::fs::File;
use std::io::{stdin, stdout, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hce::sink::TracingSink;
use hce::{CommunicationLog, DeactivationReason, Filter, HostApduService, Responder};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Malformed APDU: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid filter: {0}")]
    Filter(#[from] hce::filter::Error),

    #[error("Could not read the communication log: {0}")]
    Log(#[from] hce::sink::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not serialize the communication log: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Parser)]
#[command(name = "hce", version, about = "Answer APDU commands as an emulated NFC card.")]
struct Cli {
    /// Maximum number of entries kept in the communication log.
    #[arg(long, default_value_t = hce::log::DEFAULT_CAPACITY)]
    capacity: usize,

    /// Hide log entries matching the hex pattern; `*` matches any run of hex digits.
    #[arg(long = "filter", value_name = "PATTERN")]
    filters: Vec<String>,

    /// Prints the visible communication log after running.
    #[arg(long)]
    show_log: bool,

    /// Prints the communication log as JSON.
    #[arg(long, requires = "show_log")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answers each hex-encoded APDU given as an argument.
    Process {
        #[arg(value_name = "HEX", required = true)]
        apdus: Vec<String>,
    },

    /// Notifies the responder that the link was deactivated.
    Deactivate {
        #[arg(allow_negative_numbers = true)]
        reason: i32,
    },

    /// Answers hex-encoded APDUs read line by line from a file, or stdin if omitted.
    Replay { path: Option<PathBuf> },
}

type Service = Responder<(TracingSink, CommunicationLog)>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut filter = Filter::new();
    for pattern in &cli.filters {
        filter.add(pattern)?;
    }

    let responder = Responder::new((TracingSink, CommunicationLog::with_capacity(cli.capacity)));
    let mut out = stdout().lock();

    match cli.command {
        Command::Process { apdus } => {
            let apdus = apdus
                .iter()
                .map(|a| apdu::parse(a))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            respond_all(&responder, &apdus, &mut out)?;
        }
        Command::Deactivate { reason } => {
            responder.handle_deactivation(DeactivationReason::from(reason));
        }
        Command::Replay { path } => {
            let apdus = match path {
                Some(path) => apdu::read_lines(BufReader::new(File::open(path)?))?,
                None => apdu::read_lines(stdin().lock())?,
            };

            respond_all(&responder, &apdus, &mut out)?;
        }
    }

    if cli.show_log {
        print_log(&responder, &filter, cli.json, &mut out)?;
    }

    Ok(())
}

fn respond_all<W>(responder: &Service, apdus: &[Vec<u8>], out: &mut W) -> Result<()>
where
    W: Write,
{
    for apdu in apdus {
        let response = responder.handle_command(apdu);
        writeln!(out, "{}", hex::encode_upper(response))?;
    }

    debug!("Answered {} APDU(s)", apdus.len());

    Ok(())
}

fn print_log<W>(responder: &Service, filter: &Filter, json: bool, out: &mut W) -> Result<()>
where
    W: Write,
{
    let (_, log) = responder.sink();
    let entries = log.visible(filter)?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &entries)?;
    } else {
        CommunicationLog::write_to(out, &entries)?;
    }
    if json || !entries.is_empty() {
        writeln!(out)?;
    }

    Ok(())
}
