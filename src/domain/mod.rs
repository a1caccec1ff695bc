//! Domain model: entities, value types and the ports the application layer
//! talks to. Nothing in here performs I/O.

pub mod account;
pub mod assistant;
pub mod clock;
pub mod funding;
pub mod key;
pub mod ledger;
pub mod limit;
pub mod money;
pub mod ports;
pub mod receipt;
pub mod schedule;
pub mod transfer;
