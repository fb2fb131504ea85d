pub mod cookies;
pub mod handlers;
pub mod protocol;
pub mod repos;
pub mod routes;
pub mod state;
