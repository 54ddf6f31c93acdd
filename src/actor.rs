pub mod broadcast;
pub mod enumerator;
pub mod subscriptions;
pub mod taskbar;
pub mod window_watcher;
