pub mod allowlist;
pub mod config;
pub mod error;
pub mod qbit;
pub mod server;
pub mod sync;
pub mod watcher;

pub use allowlist::IpAllowlist;
pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use qbit::QbitClient;
pub use server::{create_router, proxy_client, AppState};
pub use sync::{PortSync, PortTarget};
pub use watcher::PortWatcher;
