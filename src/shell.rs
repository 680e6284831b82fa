use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::client::{FileProcessorClient, Operation, OperationRequest};
use crate::report;
use crate::transfer::TransferOutcome;

const MENU: &str = "
╔════════════════════════════════════════╗
║   File Processor gRPC Client (Rust)    ║
╠════════════════════════════════════════╣
║  1. Compress PDF                       ║
║  2. Convert PDF to TXT                 ║
║  3. Convert Image Format               ║
║  4. Resize Image                       ║
║  5. Exit                               ║
╚════════════════════════════════════════╝";

/// Runs one operation and prints its banner, input details and result.
pub async fn run_and_report(
    client: &FileProcessorClient,
    request: OperationRequest,
) -> TransferOutcome {
    println!("{}", report::render_banner(&request.operation));
    if let Some(input) = report::render_input(&request.input).await {
        println!("{}", input);
    }
    println!("⬆️  Uploading file...");

    let outcome = client.process(request.clone()).await;
    println!("{}\n", report::render_outcome(&request, &outcome));
    outcome
}

/// Interactive menu over `input`. Returns when the user picks exit or the
/// input ends.
pub struct Shell<'a, R> {
    client: &'a FileProcessorClient,
    lines: Lines<R>,
}

impl<'a, R: AsyncBufRead + Unpin> Shell<'a, R> {
    pub fn new(client: &'a FileProcessorClient, input: R) -> Self {
        Shell {
            client,
            lines: input.lines(),
        }
    }

    async fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        print!("{}", text);
        io::stdout().flush()?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            println!("{}", MENU);
            let Some(line) = self.prompt("\nChoose an option: ").await? else {
                return Ok(());
            };
            let choice: u32 = match line.parse() {
                Ok(choice) => choice,
                Err(_) => {
                    println!("❌ Invalid input!");
                    continue;
                }
            };
            if choice == 5 {
                println!("\n👋 Goodbye!\n");
                return Ok(());
            }
            if !(1..=4).contains(&choice) {
                println!("❌ Invalid option!");
                continue;
            }

            let Some(input) = self.prompt("\nInput file path: ").await? else {
                return Ok(());
            };
            let Some(output) = self.prompt("Output file path: ").await? else {
                return Ok(());
            };

            let operation = match choice {
                1 => Operation::CompressPdf,
                2 => Operation::PdfToText,
                3 => {
                    let Some(format) = self.prompt("Output format (png, jpg, etc.): ").await? else {
                        return Ok(());
                    };
                    Operation::ConvertImage { format }
                }
                _ => match self.read_dimensions().await? {
                    Some((width, height)) => Operation::ResizeImage { width, height },
                    None => {
                        println!("❌ Invalid dimensions!");
                        println!("\n❌ Operation failed!\n");
                        continue;
                    }
                },
            };

            run_and_report(self.client, OperationRequest::new(operation, input, output)).await;
        }
    }

    async fn read_dimensions(&mut self) -> io::Result<Option<(i32, i32)>> {
        let width = self.prompt("Width: ").await?;
        let height = self.prompt("Height: ").await?;
        Ok(parse_dimensions(width.as_deref(), height.as_deref()))
    }
}

fn parse_dimensions(width: Option<&str>, height: Option<&str>) -> Option<(i32, i32)> {
    let width = width?.parse().ok()?;
    let height = height?.parse().ok()?;
    Some((width, height))
}
