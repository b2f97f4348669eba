pub mod errors;
pub mod mail;
pub mod routes;
pub mod startup;

pub use startup::{initialize, load_config, run, serve, AppContext};
