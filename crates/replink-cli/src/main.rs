//! Load files onto a MicroPython board over its raw REPL.
//!
//! The device argument selects the transport by syntax: a serial path
//! (`/dev/ttyACM0`, `COM3`) or a network address (`192.168.1.1`,
//! `board.local:2323`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use replink_core::Transport;
use replink_session::RawReplSession;
use replink_transport::{DeviceAddr, SerialTransport, TcpTransport};
use replink_upload::{UploadRequest, Uploader};

/// Bound on TCP connect and each login prompt.
const NET_SETUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(
    name = "replink",
    about = "Load files onto a MicroPython board over its raw REPL"
)]
struct Args {
    /// The serial device or the IP address of the board
    device: String,

    /// File to load
    file: PathBuf,

    /// The baud rate of the serial device
    #[arg(short = 'b', long, default_value_t = 115_200)]
    baudrate: u32,

    /// The network login username
    #[arg(short = 'u', long, default_value = "micro")]
    user: String,

    /// The network login password
    #[arg(short = 'p', long, default_value = "python")]
    password: String,

    /// Seconds to wait for the board to become available
    #[arg(short = 'w', long, default_value_t = 0)]
    wait: u64,

    /// Name to save the file as, if different from the file name
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let data =
        std::fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let dest = match args.name {
        Some(ref name) => name.clone(),
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("file path has no file name")?,
    };

    let transport = connect(&args).await?;
    let mut session = RawReplSession::new(transport);
    session.enter_raw_repl().await?;

    let request = UploadRequest::new(data, dest.clone());
    let expected = request.data.len();
    let mut uploader = Uploader::new(session);
    let result = uploader
        .save_with_progress(&request, &mut |done, total| {
            tracing::debug!(done, total, "statement acknowledged");
        })
        .await?;

    if result.is_remote_error() {
        // The board's traceback goes to the error stream verbatim.
        eprint!("{}", result.stderr_lossy());
        uploader.into_session().close().await;
        bail!("upload of {dest} failed");
    }

    uploader.verify(&dest, expected).await?;

    let mut session = uploader.into_session();
    session.exit_raw_repl().await?;
    session.close().await;
    tracing::info!(bytes = expected, dest = %dest, "upload complete");
    Ok(())
}

async fn connect(args: &Args) -> anyhow::Result<Box<dyn Transport>> {
    match DeviceAddr::parse(&args.device) {
        DeviceAddr::Serial { path } => {
            let wait = Duration::from_secs(args.wait);
            let transport = SerialTransport::open(&path, args.baudrate, wait).await?;
            Ok(Box::new(transport))
        }
        DeviceAddr::Tcp { host, port } => {
            let mut transport = TcpTransport::connect(&host, port, NET_SETUP_TIMEOUT).await?;
            transport
                .login(&args.user, &args.password, NET_SETUP_TIMEOUT)
                .await?;
            Ok(Box::new(transport))
        }
    }
}
