// Interface adapters: wire protocol, HTTP/WS handlers, and outbound repos.

pub mod handlers;
pub mod http;
pub mod protocol;
pub mod repos;
pub mod routes;
pub mod state;
pub mod ws;
