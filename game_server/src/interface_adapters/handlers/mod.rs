pub mod game;
pub mod healthcheck;
pub mod lobby;
pub mod profile;
