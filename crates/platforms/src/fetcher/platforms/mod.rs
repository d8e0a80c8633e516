pub mod instagram;
pub mod tiktok;
