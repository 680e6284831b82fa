//! Automated run of every operation against a directory of sample files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{FileProcessorClient, Operation, OperationRequest};
use crate::error::TransferError;
use crate::shell::run_and_report;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

/// How long the suite waits for the server before giving up.
pub const READY_WAIT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseResult {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Default)]
pub struct SuiteSummary {
    pub run: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SuiteSummary {
    fn record(&mut self, result: CaseResult) {
        self.run += 1;
        match result {
            CaseResult::Passed => self.passed += 1,
            CaseResult::Failed => self.failed += 1,
            CaseResult::Skipped => self.skipped += 1,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Sample files are taken from `files`, results land in `results`.
pub struct Suite<'a> {
    client: &'a FileProcessorClient,
    files: PathBuf,
    results: PathBuf,
}

impl<'a> Suite<'a> {
    pub fn new(client: &'a FileProcessorClient, files: PathBuf, results: PathBuf) -> Self {
        Suite {
            client,
            files,
            results,
        }
    }

    /// Fails only when the server cannot be reached or the results directory
    /// cannot be created; individual case failures end up in the summary.
    pub async fn run(&self) -> Result<SuiteSummary, TransferError> {
        self.client.check_ready(READY_WAIT).await?;
        tokio::fs::create_dir_all(&self.results)
            .await
            .map_err(|e| TransferError::io(&self.results, e))?;

        let pdf = first_with_extension(&self.files, &["pdf"]).await;
        let image = first_with_extension(&self.files, &IMAGE_EXTENSIONS).await;

        let mut summary = SuiteSummary::default();
        let cases = [
            (Operation::CompressPdf, pdf.clone(), "compressed_{name}"),
            (Operation::PdfToText, pdf, "{stem}.txt"),
            (
                Operation::ConvertImage {
                    format: "png".to_string(),
                },
                image.clone(),
                "{stem}_converted.png",
            ),
            (
                Operation::ResizeImage {
                    width: 400,
                    height: 300,
                },
                image,
                "{stem}_resized.jpg",
            ),
        ];

        for (operation, input, pattern) in cases {
            let result = match input {
                Some(input) => {
                    let output = self.results.join(output_name(&input, pattern));
                    self.run_case(operation, input, output).await
                }
                None => {
                    println!("⚠️  No input file for {}, skipped", operation);
                    CaseResult::Skipped
                }
            };
            summary.record(result);
        }

        println!("\n{}", "=".repeat(60));
        println!("SUMMARY");
        println!("{}", "=".repeat(60));
        println!("Tests run:     {}", summary.run);
        println!("Successes:     {}", summary.passed);
        println!("Failures:      {}", summary.failed);
        println!("Skipped:       {}", summary.skipped);
        println!("{}\n", "=".repeat(60));
        Ok(summary)
    }

    async fn run_case(&self, operation: Operation, input: PathBuf, output: PathBuf) -> CaseResult {
        let is_compression = operation == Operation::CompressPdf;
        let request = OperationRequest::new(operation, &input, &output);
        let outcome = run_and_report(self.client, request).await;
        if !outcome.success() {
            return CaseResult::Failed;
        }

        let Ok(written) = tokio::fs::metadata(&output).await.map(|m| m.len()) else {
            println!("❌ Output file missing: {}", output.display());
            return CaseResult::Failed;
        };
        if written == 0 {
            println!("❌ Output file is empty: {}", output.display());
            return CaseResult::Failed;
        }
        if is_compression && written > outcome.input_size {
            println!(
                "❌ Compressed output ({} bytes) is larger than the input ({} bytes)",
                written, outcome.input_size
            );
            return CaseResult::Failed;
        }
        CaseResult::Passed
    }
}

/// First file in `dir`, by name, whose extension is one of `extensions`.
async fn first_with_extension(dir: &Path, extensions: &[&str]) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut matches = vec![];
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_file = tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
        let wanted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_file && wanted {
            matches.push(path);
        }
    }
    matches.sort();
    matches.into_iter().next()
}

fn output_name(input: &Path, pattern: &str) -> String {
    let name = input.file_name().and_then(|n| n.to_str()).unwrap_or("input");
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("input");
    pattern.replace("{name}", name).replace("{stem}", stem)
}
