pub mod connection;
pub use connection::ConnectionManager;

pub mod dispatcher;
pub use dispatcher::{Operation, OperationRequest};

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::TransferError;
use crate::transfer::{TransferOutcome, TransferSession};

/// Client for the remote file processing service.
///
/// Every operation runs as its own [`TransferSession`] over the one shared
/// channel and reports through a [`TransferOutcome`].
pub struct FileProcessorClient {
    config: ClientConfig,
    connection: ConnectionManager,
}

impl FileProcessorClient {
    pub fn new(config: ClientConfig) -> Result<Self, TransferError> {
        let connection = ConnectionManager::new(&config)?;
        Ok(FileProcessorClient { config, connection })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn compress_pdf(&self, input: &Path, output: &Path) -> TransferOutcome {
        self.process(OperationRequest::new(Operation::CompressPdf, input, output))
            .await
    }

    pub async fn convert_to_txt(&self, input: &Path, output: &Path) -> TransferOutcome {
        self.process(OperationRequest::new(Operation::PdfToText, input, output))
            .await
    }

    pub async fn convert_image_format(
        &self,
        input: &Path,
        output: &Path,
        format: &str,
    ) -> TransferOutcome {
        let operation = Operation::ConvertImage {
            format: format.to_string(),
        };
        self.process(OperationRequest::new(operation, input, output))
            .await
    }

    pub async fn resize_image(
        &self,
        input: &Path,
        output: &Path,
        width: i32,
        height: i32,
    ) -> TransferOutcome {
        let operation = Operation::ResizeImage { width, height };
        self.process(OperationRequest::new(operation, input, output))
            .await
    }

    pub async fn process(&self, request: OperationRequest) -> TransferOutcome {
        self.process_with_cancel(request, CancellationToken::new())
            .await
    }

    pub async fn process_with_cancel(
        &self,
        request: OperationRequest,
        cancel: CancellationToken,
    ) -> TransferOutcome {
        TransferSession::new(&self.connection, request, self.config.chunk_size)
            .with_timeout(self.config.request_timeout)
            .with_cancellation(cancel)
            .run()
            .await
    }

    pub async fn check_ready(&self, wait: Duration) -> Result<(), TransferError> {
        self.connection.check_ready(wait).await
    }

    pub fn close(&self) {
        self.connection.close();
    }
}
