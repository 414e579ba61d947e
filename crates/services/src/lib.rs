pub mod agents;
pub mod auth;
pub mod debug_logs;
pub mod digest;
pub mod wakeup;

pub use agents::{AgentHandle, AgentService};
pub use auth::AuthService;
pub use debug_logs::DebugLogStore;
pub use digest::DigestService;
pub use wakeup::WakeupService;

pub mod test_utils;
