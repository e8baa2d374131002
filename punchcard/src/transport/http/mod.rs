mod routes;
mod server;

pub use routes::{AppState, Principal, routes};
pub use server::serve;
