pub mod browser;
pub mod cdp;
pub mod store;

pub use browser::{
    BrowserCookie, BrowserLauncher, BrowserManager, BrowserPage, BrowserSession, PageLanding,
    UnavailableLauncher,
};
pub use cdp::CdpLauncher;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, store_key};
