pub mod handlers;
pub mod routes;

pub use routes::{create_router, proxy_client, AppState};
