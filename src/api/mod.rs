mod handlers;
mod server;

pub use handlers::PredictQuery;
pub use server::{router, ApiServer, ServerState};
