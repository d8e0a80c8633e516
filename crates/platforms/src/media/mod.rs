pub mod file;
pub mod post;
pub mod stream;

pub use file::{AudioFile, FileType, MediaFile};
pub use post::{MultiPost, Post, SinglePost};
pub use stream::{ByteStream, MediaStream, StreamBatch, collect_bytes};
