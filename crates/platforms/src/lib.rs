//! Resolves TikTok and Instagram post links into normalized posts and streams
//! their media in ordered batches.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use platforms_fetcher::config::PlatformsConfig;
//! use platforms_fetcher::fetcher::default_dispatcher;
//! use platforms_fetcher::session::{BrowserManager, MemoryStore};
//!
//! # async fn run() -> Result<(), platforms_fetcher::fetcher::FetchError> {
//! let dispatcher = default_dispatcher(
//!     PlatformsConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(BrowserManager::unavailable("no browser configured")),
//! )?;
//!
//! if let Some(fetcher) = dispatcher.find("https://www.instagram.com/p/C1a2b3/") {
//!     let post = fetcher.fetch_post().await?;
//!     let mut batches = fetcher.generate_stream_batches(post.files());
//!     while let Some(batch) = batches.next().await {
//!         println!("batch of {}", batch.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fetcher;
pub mod media;
pub mod session;

pub use config::PlatformsConfig;
pub use fetcher::{Dispatcher, FetchError, PlatformFetcher};
pub use media::{MediaFile, Post};

#[cfg(test)]
pub(crate) mod test_util {
    /// Serves `router` on an ephemeral local port and returns its base url.
    pub(crate) async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}
