//! Models shared by every camfleet crate: targets, devices, packages and deployment state.

pub mod config;
pub mod credential;
pub mod deployment;
pub mod device;
pub mod error;
pub mod inventory;
pub mod network;
pub mod package;

pub use error::{InventoryError, TargetError};
