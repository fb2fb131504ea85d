pub mod guest_login;
pub mod logout;
pub mod oauth_login;
pub mod token_refresh;
