mod actor;
mod config;
mod dkg;
mod error;
mod memledger;
mod service;
mod tasks;

pub use actor::*;
pub use config::*;
pub use dkg::*;
pub use error::*;
pub use memledger::*;
pub use service::*;
pub use tasks::*;

#[cfg(test)]
mod tests;
