pub mod geometry;
pub mod platform;
pub mod replay;
pub mod scheduler;
pub mod screen;
