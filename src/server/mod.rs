mod handlers;
mod models;
mod render;
mod state;

pub use handlers::{build_router, run_server};
pub use state::ServerState;
