pub use taskdeck_cli::cli;
pub use taskdeck_cli::commands;
pub use taskdeck_cli::config;
pub use taskdeck_cli::{run, run_blocking};
pub use taskdeck_cli::AppConfig;

pub use taskdeck_core as core;
pub use taskdeck_core::capture;
pub use taskdeck_core::coordinator;
pub use taskdeck_core::model;
pub use taskdeck_core::parser;
pub use taskdeck_core::{AuthService, Coordinator, Session};
