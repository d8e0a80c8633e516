use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};

use super::file::FileType;

/// A lazily consumed body of a remote file.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A downloadable stream together with the kind of media it carries.
pub struct MediaStream {
    pub file_type: FileType,
    pub stream: ByteStream,
    /// Set when the original download failed and the bundled placeholder
    /// image was substituted.
    pub is_placeholder: bool,
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("file_type", &self.file_type)
            .field("is_placeholder", &self.is_placeholder)
            .finish_non_exhaustive()
    }
}

/// One group of streams produced by the batched pipeline.
#[derive(Debug)]
pub struct StreamBatch {
    /// Zero-based position of the batch in the post.
    pub index: usize,
    pub streams: Vec<MediaStream>,
}

impl StreamBatch {
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Drains a stream into memory.
pub async fn collect_bytes(stream: ByteStream) -> io::Result<Vec<u8>> {
    stream
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
}
