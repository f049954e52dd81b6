mod global_state;
mod response;
mod routes;
mod utils;

pub use global_state::GlobalState;
pub use response::{AppError, AppSuccess};
pub use routes::{consultation_routes, history_routes};
pub use utils::setup_tracing;
