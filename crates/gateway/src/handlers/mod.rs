//! API handlers module

pub mod articles;
pub mod health;
pub mod keywords;
pub mod pipeline;
pub mod queue;
pub mod settings;
