//! Window inventory and reconciliation engine for an on-screen taskbar.
//!
//! The host platform is reached only through the capability traits in
//! [`sys::platform`]; time only through [`sys::scheduler::Scheduler`]. Both are
//! injected into [`actor::window_watcher::WindowWatcher`], which owns the poll
//! loops and fans window lists out to per-display subscribers.

pub mod actor;
pub mod common;
pub mod layout_engine;
pub mod model;
pub mod sys;
