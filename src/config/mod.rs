pub mod loader;
pub mod structs;

pub use loader::{load_config, load_config_from};
pub use structs::Config;
