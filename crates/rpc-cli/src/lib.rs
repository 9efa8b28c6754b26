// Export our modules
pub mod cli_main;
pub mod methods;
pub mod run;

pub use methods::builtin_router;
pub use run::{call, call_over, serve};
