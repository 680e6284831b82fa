//! Human-readable rendering of sessions for the command line.

use std::path::Path;

use crate::client::{Operation, OperationRequest};
use crate::error::{ErrorKind, TransferError};
use crate::size::format_size;
use crate::transfer::TransferOutcome;

const RULE: &str = "─────────────────────────────────────";

pub fn render_banner(operation: &Operation) -> String {
    format!("\n┌{rule}┐\n│ {:<35} │\n└{rule}┘\n", operation.to_string(), rule = RULE)
}

/// Input details shown before the upload starts; `None` when the input is
/// missing, the session reports that itself.
pub async fn render_input(input: &Path) -> Option<String> {
    let size = tokio::fs::metadata(input).await.ok()?.len();
    Some(format!(
        "📄 Input file: {}\n📊 File size: {}",
        input.display(),
        format_size(size)
    ))
}

pub fn render_error(err: &TransferError) -> String {
    match err.kind() {
        ErrorKind::InputNotFound | ErrorKind::Remote => format!("❌ {}", err),
        _ => format!("❌ error: {}", err),
    }
}

pub fn render_outcome(request: &OperationRequest, outcome: &TransferOutcome) -> String {
    if let Some(err) = &outcome.error {
        return format!("{}\n\n❌ Operation failed!", render_error(err));
    }

    format!(
        "✅ Upload completed in {}ms ({} chunks)\n\
         ✅ Download completed in {}ms\n\
         💾 Output file: {}\n\
         📊 Output size: {}\n\
         \n\
         ⏱️  Total time: {}ms\n\
         ✅ Operation completed successfully!",
        outcome.upload_duration.as_millis(),
        outcome.chunks_uploaded,
        outcome.download_duration.as_millis(),
        request.output.display(),
        format_size(outcome.bytes_downloaded),
        outcome.total_duration().as_millis()
    )
}
