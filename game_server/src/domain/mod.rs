pub mod entities;
pub mod errors;
pub mod ports;
pub mod session;

pub use entities::{Game, GameResult, GameStatus, GameType, GameUserInfo, LobbyUserInfo, UserType};
pub use errors::AppError;
pub use session::{SupervisorEvent, SupervisorEventKind};
