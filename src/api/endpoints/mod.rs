//! Route handlers.

pub mod health;
pub mod page;
pub mod upload;
