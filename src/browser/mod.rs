pub mod driver;
pub mod runner;
pub mod session;
pub mod sniffer;
pub mod state_machine;
