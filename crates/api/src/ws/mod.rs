pub mod handler;
pub mod heartbeat;
pub mod manager;
pub mod protocol;
pub mod session;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use session::Session;
