#[macro_use]
extern crate serde;

mod access;
mod acl;
mod ballot;
mod bls;
mod ciphervote;
mod configuration;
mod contract;
mod decryption;
mod dkg;
mod error;
mod form;
mod group;
mod ledger;
mod lifecycle;
mod metrics;
mod mix;
mod roster;
mod serde_hex;
mod shuffle;
mod store;
mod suffragia;
mod transaction;
mod util;
mod vote;

pub use access::*;
pub use acl::*;
pub use ballot::*;
pub use bls::*;
pub use ciphervote::*;
pub use configuration::*;
pub use contract::*;
pub use decryption::*;
pub use dkg::*;
pub use error::*;
pub use form::*;
pub use group::*;
pub use ledger::*;
pub use metrics::*;
pub use mix::*;
pub use roster::*;
pub use serde_hex::*;
pub use shuffle::*;
pub use store::*;
pub use suffragia::*;
pub use transaction::*;
pub use util::*;
