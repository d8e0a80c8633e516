mod builder;
pub mod models;
pub mod signer;

pub use builder::TikTok;
pub use signer::{BoaSignatureProvider, SignatureProvider, SigningSession};
