//! Application services: the render pipeline and background jobs.

pub mod error;
pub mod keepalive;
pub mod render;
