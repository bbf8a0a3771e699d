//! Command implementations.

pub mod contacts;
pub mod embed;
pub mod rotate;
pub mod setup;
pub mod sign;
pub mod verify;
