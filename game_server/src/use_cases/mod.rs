pub mod broker;
pub mod consumers;
pub mod game;
pub mod lobby;
pub mod profile;
pub mod queue_in;
pub mod session;
