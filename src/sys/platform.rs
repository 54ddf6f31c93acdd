//! Capability interfaces for the host window-management platform.
//!
//! The core only ever talks to the host through these traits. A real adapter
//! wraps the host's application and window objects; tests use
//! [`crate::sys::replay::ScriptedPlatform`].

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::model::window::WindowId;
use crate::sys::screen::DisplayId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("window {0} no longer exists")]
    WindowGone(WindowId),
    #[error("application {0:?} is unavailable")]
    ApplicationUnavailable(String),
    #[error("host call failed: {0}")]
    Call(String),
}

/// An opaque image resource (application icon or window snapshot).
///
/// Cloning is cheap; pixel data is shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    data: Rc<[u8]>,
}

impl Image {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Image {
        Image { width, height, data: data.into() }
    }

    /// What the host hands back for windows it cannot render, e.g. minimized
    /// ones.
    pub fn empty() -> Image { Image::new(0, 0, Vec::new()) }

    pub fn is_empty(&self) -> bool { self.width == 0 || self.height == 0 || self.data.is_empty() }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    pub fn data(&self) -> &[u8] { &self.data }
}

impl Default for Image {
    fn default() -> Self { Image::empty() }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub trait WindowHandle {
    fn id(&self) -> WindowId;
    fn title(&self) -> Result<String, HostError>;
    fn is_minimized(&self) -> Result<bool, HostError>;
    /// `None` when the owning application cannot be determined.
    fn bundle_id(&self) -> Option<String>;
    fn display_id(&self) -> Result<DisplayId, HostError>;
    /// Accessibility subrole; some applications expose a parent object with
    /// none.
    fn subrole(&self) -> Option<String>;
    fn minimize(&self) -> Result<(), HostError>;
    fn unminimize(&self) -> Result<(), HostError>;
    fn raise(&self) -> Result<(), HostError>;
    fn focus(&self) -> Result<(), HostError>;
    /// The host returns an empty image for minimized windows.
    fn capture_snapshot(&self) -> Result<Image, HostError>;
}

pub trait ApplicationHandle {
    fn bundle_id(&self) -> Option<String>;
    /// Read fresh on every call; never cached by the core.
    fn windows(&self) -> Result<Vec<Rc<dyn WindowHandle>>, HostError>;
}

pub trait PlatformProvider {
    fn running_applications(&self) -> Result<Vec<Rc<dyn ApplicationHandle>>, HostError>;
    fn is_display_locked(&self) -> bool;
    fn app_icon(&self, bundle_id: &str) -> Option<Image>;
    fn focused_window(&self) -> Option<WindowId>;
    /// Bundle id of the process hosting this taskbar, whose overlay windows
    /// are excluded from enumeration.
    fn host_bundle_id(&self) -> Option<String>;
}
