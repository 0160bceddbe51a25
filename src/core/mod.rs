//! Process-wide state shared by the serve loop and its background threads.

mod state;

pub use state::{is_shutdown, register_server, setup_shutdown_handler};
