use bytes::Bytes;
use futures::future::join_all;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tracing::{debug, warn};

use super::platform_fetcher::Fetcher;
use crate::media::{FileType, MediaFile, MediaStream, StreamBatch};

/// Image substituted for any file whose download failed.
pub static PLACEHOLDER_IMAGE: &[u8] = include_bytes!("../../resources/placeholder.png");

/// Turns a post's file list into ordered groups of byte streams.
///
/// Batches are produced one at a time: the files of batch `k + 1` are not
/// requested before batch `k` has been pulled. Inside a batch all downloads
/// run concurrently and are re-assembled in source order. A failed download
/// never fails the batch, the placeholder image takes its slot instead.
pub struct StreamPipeline<'a> {
    fetcher: &'a Fetcher,
    batch_size: usize,
}

impl<'a> StreamPipeline<'a> {
    pub fn new(fetcher: &'a Fetcher, batch_size: usize) -> Self {
        Self {
            fetcher,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_count(&self, file_count: usize) -> usize {
        file_count.div_ceil(self.batch_size)
    }

    /// Each call starts over from the first file.
    pub fn generate(&self, files: Vec<MediaFile>) -> BoxStream<'a, StreamBatch> {
        let chunks: Vec<Vec<MediaFile>> = files
            .chunks(self.batch_size)
            .map(<[MediaFile]>::to_vec)
            .collect();
        let total = chunks.len();
        let fetcher = self.fetcher;

        stream::iter(chunks.into_iter().enumerate())
            .then(move |(index, chunk)| async move {
                debug!("Fetching batch {}/{} ({} files)", index + 1, total, chunk.len());
                let streams = join_all(chunk.iter().map(|file| fetch_or_placeholder(fetcher, file)))
                    .await;
                StreamBatch { index, streams }
            })
            .boxed()
    }
}

async fn fetch_or_placeholder(fetcher: &Fetcher, file: &MediaFile) -> MediaStream {
    match fetcher.get_byte_stream(file.download_url()).await {
        Ok(stream) => MediaStream {
            file_type: file.file_type(),
            stream,
            is_placeholder: false,
        },
        Err(e) => {
            warn!(
                "Error fetching {} {}: {}",
                file.file_type(),
                file.download_url(),
                e
            );
            placeholder_stream(file.file_type())
        }
    }
}

/// The placeholder image standing in for a failed file of type `file_type`.
pub fn placeholder_stream(file_type: FileType) -> MediaStream {
    MediaStream {
        file_type,
        stream: Box::pin(stream::once(async {
            Ok(Bytes::from_static(PLACEHOLDER_IMAGE))
        })),
        is_placeholder: true,
    }
}
