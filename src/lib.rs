// Library surface for the binary, headless/integration tests and reuse.
// Rendering and key bindings stay bin-only in main.rs and ui.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod drill;
pub mod error;
pub mod history;
pub mod logging;
pub mod record;
pub mod runtime;
pub mod scramble;
pub mod session;
pub mod solve_timer;
pub mod step_timer;
pub mod store;
pub mod util;
