use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fproc::client::{FileProcessorClient, Operation, OperationRequest};
use fproc::config::{ClientConfig, CHUNK_SIZE, DEFAULT_SERVER_ADDRESS};
use fproc::shell::{self, Shell};
use fproc::suite::Suite;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Client for the file processing gRPC service",
    long_about = None
)]
struct Args {
    /// Server address
    #[arg(long, global = true, env = "GRPC_SERVER", default_value = DEFAULT_SERVER_ADDRESS)]
    server: String,

    /// Payload bytes per uploaded chunk
    #[arg(long, global = true, default_value_t = CHUNK_SIZE)]
    chunk_size: usize,

    /// Per-operation deadline in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Connection timeout in seconds
    #[arg(long, global = true, default_value_t = 5)]
    connect_timeout: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive menu (the default)
    Shell,
    CompressPdf {
        input: PathBuf,
        output: PathBuf,
    },
    PdfToText {
        input: PathBuf,
        output: PathBuf,
    },
    ConvertImage {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        format: String,
    },
    ResizeImage {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, allow_negative_numbers = true)]
        width: i32,
        #[arg(long, allow_negative_numbers = true)]
        height: i32,
    },
    /// Check that the server is reachable
    Check {
        /// Seconds to wait for the server
        #[arg(long, default_value_t = 5)]
        wait: u64,
    },
    /// Run every operation on the sample files in DIR
    Suite {
        dir: PathBuf,
        /// Where outputs are written, defaults to DIR/../test_results
        #[arg(long)]
        results: Option<PathBuf>,
    },
}

impl Command {
    fn into_request(self) -> Option<OperationRequest> {
        let (operation, input, output) = match self {
            Command::CompressPdf { input, output } => (Operation::CompressPdf, input, output),
            Command::PdfToText { input, output } => (Operation::PdfToText, input, output),
            Command::ConvertImage {
                input,
                output,
                format,
            } => (Operation::ConvertImage { format }, input, output),
            Command::ResizeImage {
                input,
                output,
                width,
                height,
            } => (Operation::ResizeImage { width, height }, input, output),
            Command::Shell | Command::Check { .. } | Command::Suite { .. } => return None,
        };
        Some(OperationRequest::new(operation, input, output))
    }
}

async fn run_shell(client: &FileProcessorClient) -> ExitCode {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut shell = Shell::new(client, stdin);
    tokio::select! {
        result = shell.run() => {
            if let Err(e) = result {
                eprintln!("❌ Error reading input: {}", e);
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n\n👋 Interrupted by user\n");
        }
    }
    ExitCode::SUCCESS
}

async fn run_command(client: &FileProcessorClient, command: Command) -> ExitCode {
    match command {
        Command::Shell => run_shell(client).await,
        Command::Check { wait } => {
            let address = &client.config().server_address;
            match client.check_ready(Duration::from_secs(wait)).await {
                Ok(()) => {
                    println!("✅ Server reachable at {}", address);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!("❌ Server not reachable at {}: {}", address, e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Suite { dir, results } => {
            let results = results.unwrap_or_else(|| dir.join("..").join("test_results"));
            match Suite::new(client, dir, results).run().await {
                Ok(summary) if summary.success() => ExitCode::SUCCESS,
                Ok(_) => ExitCode::FAILURE,
                Err(e) => {
                    println!("❌ Server not available at {}: {}", client.config().server_address, e);
                    ExitCode::FAILURE
                }
            }
        }
        command => match command.into_request() {
            Some(request) => {
                if shell::run_and_report(client, request).await.success() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }
            None => ExitCode::FAILURE,
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ClientConfig::new(args.server)
        .with_chunk_size(args.chunk_size)
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_request_timeout(args.timeout.map(Duration::from_secs));
    tracing::debug!(?config, "client configuration");

    let client = match FileProcessorClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = run_command(&client, args.command.unwrap_or(Command::Shell)).await;
    client.close();
    code
}
