//! CLI Commands

pub mod notify;
pub mod summary;
pub mod upload;
