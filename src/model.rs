pub mod cache;
pub mod reconcile;
pub mod server;
pub mod window;
