use std::fmt;
use std::path::PathBuf;

use futures_util::Stream;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::transport::Channel;
use tonic::{Request, Response, Status, Streaming};

use crate::error::TransferError;
use crate::proto::file_processor_service_client::FileProcessorServiceClient;
use crate::proto::FileChunk;

/// Metadata keys carrying operation parameters alongside the chunk stream.
pub const FORMAT_KEY: &str = "x-target-format";
pub const WIDTH_KEY: &str = "x-target-width";
pub const HEIGHT_KEY: &str = "x-target-height";

/// A remote processing operation and its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    CompressPdf,
    PdfToText,
    ConvertImage { format: String },
    ResizeImage { width: i32, height: i32 },
}

impl Operation {
    /// Name of the remote method this operation maps to.
    pub fn rpc_name(&self) -> &'static str {
        match self {
            Operation::CompressPdf => "CompressPDF",
            Operation::PdfToText => "ConvertToTXT",
            Operation::ConvertImage { .. } => "ConvertImageFormat",
            Operation::ResizeImage { .. } => "ResizeImage",
        }
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        match self {
            Operation::CompressPdf | Operation::PdfToText => Ok(()),
            Operation::ConvertImage { format } => {
                let format = format.trim();
                if format.is_empty() {
                    return Err(TransferError::InvalidParameters(
                        "target format must not be empty".to_string(),
                    ));
                }
                if !format.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(TransferError::InvalidParameters(format!(
                        "target format '{}' is not a format token",
                        format
                    )));
                }
                Ok(())
            }
            Operation::ResizeImage { width, height } => {
                if *width <= 0 || *height <= 0 {
                    return Err(TransferError::InvalidParameters(format!(
                        "dimensions must be positive, got {}x{}",
                        width, height
                    )));
                }
                Ok(())
            }
        }
    }

    /// Writes the out-of-band parameters into the call's metadata. They go out
    /// with the call headers, before the first chunk.
    pub fn attach_parameters(&self, metadata: &mut MetadataMap) -> Result<(), TransferError> {
        self.validate()?;
        match self {
            Operation::CompressPdf | Operation::PdfToText => {}
            Operation::ConvertImage { format } => {
                let value = MetadataValue::try_from(format.trim().to_ascii_lowercase()).map_err(
                    |_| TransferError::InvalidParameters(format!("bad format {}", format)),
                )?;
                metadata.insert(FORMAT_KEY, value);
            }
            Operation::ResizeImage { width, height } => {
                metadata.insert(WIDTH_KEY, MetadataValue::from(*width));
                metadata.insert(HEIGHT_KEY, MetadataValue::from(*height));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CompressPdf => write!(f, "Compress PDF"),
            Operation::PdfToText => write!(f, "Convert PDF to TXT"),
            Operation::ConvertImage { format } => {
                write!(f, "Convert Image to {}", format.trim().to_uppercase())
            }
            Operation::ResizeImage { width, height } => {
                write!(f, "Resize Image to {}x{}", width, height)
            }
        }
    }
}

/// One unit of work: an operation plus where to read and write.
#[derive(Clone, Debug)]
pub struct OperationRequest {
    pub operation: Operation,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl OperationRequest {
    pub fn new(
        operation: Operation,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        OperationRequest {
            operation,
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Issues the streaming call matching `operation`.
pub async fn dispatch<S>(
    client: &mut FileProcessorServiceClient<Channel>,
    operation: &Operation,
    request: Request<S>,
) -> Result<Response<Streaming<FileChunk>>, Status>
where
    S: Stream<Item = FileChunk> + Send + 'static,
{
    tracing::debug!(rpc = operation.rpc_name(), "dispatching call");
    match operation {
        Operation::CompressPdf => client.compress_pdf(request).await,
        Operation::PdfToText => client.convert_to_txt(request).await,
        Operation::ConvertImage { .. } => client.convert_image_format(request).await,
        Operation::ResizeImage { .. } => client.resize_image(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rejects_non_positive_dimensions() {
        for (width, height) in [(0, 300), (400, 0), (-1, 300), (400, -20)] {
            let err = Operation::ResizeImage { width, height }.validate().err().unwrap();
            assert_eq!(err.kind(), ErrorKind::InvalidParameters);
        }
        assert!(Operation::ResizeImage { width: 400, height: 300 }.validate().is_ok());
    }

    #[test]
    fn rejects_bad_format_tokens() {
        for format in ["", "   ", "p n g", "png;rm", "jpé"] {
            let op = Operation::ConvertImage { format: format.to_string() };
            let err = op.validate().err().unwrap();
            assert_eq!(err.kind(), ErrorKind::InvalidParameters, "{:?}", format);
        }
    }

    #[test]
    fn resize_parameters_go_into_metadata() {
        let mut metadata = MetadataMap::new();
        Operation::ResizeImage { width: 400, height: 300 }
            .attach_parameters(&mut metadata)
            .unwrap();
        assert_eq!(metadata.get(WIDTH_KEY).unwrap().to_str().unwrap(), "400");
        assert_eq!(metadata.get(HEIGHT_KEY).unwrap().to_str().unwrap(), "300");
        assert!(metadata.get(FORMAT_KEY).is_none());
    }

    #[test]
    fn format_is_normalized() {
        let mut metadata = MetadataMap::new();
        Operation::ConvertImage { format: " PNG ".to_string() }
            .attach_parameters(&mut metadata)
            .unwrap();
        assert_eq!(metadata.get(FORMAT_KEY).unwrap().to_str().unwrap(), "png");
    }

    #[test]
    fn parameterless_operations_add_nothing() {
        let mut metadata = MetadataMap::new();
        Operation::CompressPdf.attach_parameters(&mut metadata).unwrap();
        Operation::PdfToText.attach_parameters(&mut metadata).unwrap();
        assert!(metadata.is_empty());
    }

    #[test]
    fn labels() {
        assert_eq!(Operation::CompressPdf.to_string(), "Compress PDF");
        assert_eq!(
            Operation::ConvertImage { format: "png".to_string() }.to_string(),
            "Convert Image to PNG"
        );
        assert_eq!(
            Operation::ResizeImage { width: 800, height: 600 }.to_string(),
            "Resize Image to 800x600"
        );
        assert_eq!(Operation::PdfToText.rpc_name(), "ConvertToTXT");
    }
}
