pub mod auth_mode;
mod builder;
pub mod challenge;
pub mod login;
pub mod models;

pub use auth_mode::{AuthMode, get_auth_mode, set_auth_mode};
pub use builder::Instagram;
pub use login::{InstagramLogin, LoginHandle, LoginOutcome, cookies_have_login_data};
