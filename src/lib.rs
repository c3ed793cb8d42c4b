pub mod browser;
pub mod config;
pub mod logger;
pub mod model;
pub mod server;

pub use config::*;
pub use logger::*;
pub use server::ApplicationServer;
pub use server::*;
