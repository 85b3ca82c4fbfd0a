pub mod assets;
pub mod cli;
pub mod config;
pub mod error;
pub mod fault;
pub mod host;
pub mod project;
pub mod scripts;
pub mod surface;
pub mod time;
pub mod watch;

pub use error::HostError;
pub use host::ScriptHost;
pub use scripts::HostBindings;
