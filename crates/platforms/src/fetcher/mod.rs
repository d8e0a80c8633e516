pub mod caption;
mod default;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod platform_fetcher;
pub mod platforms;
pub mod retry;

pub use default::{
    ProxyConfig, create_client, default_client, default_dispatcher, dispatcher_with_proxy,
};
pub use dispatcher::{Dispatcher, SharedContext};
pub use error::FetchError;
pub use platform_fetcher::{Fetcher, PlatformFetcher};
pub use retry::RetryPolicy;
