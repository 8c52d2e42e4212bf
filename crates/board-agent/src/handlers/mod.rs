//! Route handlers

pub mod health;
pub mod input;
pub mod presence;
pub mod session;
