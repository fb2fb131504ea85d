/// Events a `SessionGroup` posts to the `SessionManager`'s single
/// supervision loop. Never touched directly by connections — only through
/// this mailbox, so "is this group now empty" is decided in one place.
#[derive(Debug, Clone, Copy)]
pub enum SupervisorEventKind {
    Update,
    HealthcheckFail,
}

#[derive(Debug, Clone)]
pub struct SupervisorEvent {
    pub game_id: i64,
    pub user_id: String,
    pub kind: SupervisorEventKind,
}
