//! Generic session-actor fabric, instantiated once for the lobby socket and
//! once for the game socket (see `interface_adapters::ws`).

pub mod connection;
pub mod group;
pub mod manager;

pub use connection::SessionConnection;
pub use group::SessionGroup;
pub use manager::SessionManager;
