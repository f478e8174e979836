//! End-to-end checks of discovery and batch deployment against a simulated fleet.

pub mod fleet;

#[cfg(test)]
mod deployment;
#[cfg(test)]
mod discovery;
