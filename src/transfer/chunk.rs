use crate::proto::FileChunk;

/// A contiguous run of file bytes, at most one chunk size long.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    data: Vec<u8>,
}

impl Chunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Chunk> for FileChunk {
    fn from(chunk: Chunk) -> Self {
        FileChunk {
            content: chunk.data,
        }
    }
}
