pub mod chunk;
pub use chunk::Chunk;

pub mod reader;
pub use reader::{ChunkReader, UploadProbe, UploadReport};

pub mod writer;
pub use writer::ChunkWriter;

pub mod session;
pub use session::{SessionState, TransferOutcome, TransferSession};
