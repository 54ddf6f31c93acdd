use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::cache::ResourceCaches;
use crate::sys::platform::{HostError, Image, PlatformProvider, WindowHandle};
use crate::sys::screen::DisplayId;

/// Host window identity, stable for the lifetime of the window and unique
/// across displays and applications.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct WindowId(u32);

impl WindowId {
    pub fn new(id: u32) -> WindowId { WindowId(id) }

    pub fn get(&self) -> u32 { self.0 }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// One window as observed during an enumeration pass.
#[derive(Clone)]
pub struct Window {
    pub id: WindowId,
    /// Empty when the owner cannot be determined.
    pub bundle_id: String,
    pub title: String,
    pub is_minimized: bool,
    pub display_id: DisplayId,
    pub handle: Rc<dyn WindowHandle>,
}

impl Window {
    /// Reads every observed property from the host. `app_bundle_id` is used
    /// when the window itself does not report an owner.
    pub fn read(handle: Rc<dyn WindowHandle>, app_bundle_id: Option<&str>) -> Result<Window, HostError> {
        let bundle_id = handle
            .bundle_id()
            .or_else(|| app_bundle_id.map(str::to_owned))
            .unwrap_or_default();
        Ok(Window {
            id: handle.id(),
            title: handle.title()?,
            is_minimized: handle.is_minimized()?,
            display_id: handle.display_id()?,
            bundle_id,
            handle,
        })
    }

    /// Re-reads the mutable properties, keeping the last known value for any
    /// that the host fails to report.
    pub fn refreshed(&self) -> Window {
        let mut fresh = self.clone();
        match self.handle.title() {
            Ok(title) => fresh.title = title,
            Err(err) => debug!(window_id = %self.id, %err, "keeping stale title"),
        }
        match self.handle.is_minimized() {
            Ok(minimized) => fresh.is_minimized = minimized,
            Err(err) => debug!(window_id = %self.id, %err, "keeping stale minimized flag"),
        }
        match self.handle.display_id() {
            Ok(display) => fresh.display_id = display,
            Err(err) => debug!(window_id = %self.id, %err, "keeping stale display"),
        }
        fresh
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("bundle_id", &self.bundle_id)
            .field("title", &self.title)
            .field("is_minimized", &self.is_minimized)
            .field("display_id", &self.display_id)
            .finish()
    }
}

/// Outcome of one enumeration pass. An invalid result carries no
/// information: it is not an empty window list.
#[derive(Debug, Clone, Default)]
pub struct EnumerationResult {
    pub windows: Vec<Window>,
    pub is_valid: bool,
}

/// The current window list. Replaced wholesale at the end of a pass, never
/// mutated in place, so a reader holding a clone always sees one complete
/// list.
#[derive(Clone, Debug)]
pub struct WindowList(Rc<[Window]>);

impl WindowList {
    pub fn on_display(&self, display: DisplayId) -> impl Iterator<Item = &Window> {
        self.0.iter().filter(move |w| w.display_id == display)
    }

    pub fn ptr_eq(&self, other: &WindowList) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

impl Default for WindowList {
    fn default() -> Self { WindowList(Rc::from(Vec::new())) }
}

impl From<Vec<Window>> for WindowList {
    fn from(windows: Vec<Window>) -> Self { WindowList(windows.into()) }
}

impl Deref for WindowList {
    type Target = [Window];

    fn deref(&self) -> &[Window] { &self.0 }
}

/// A window as handed to subscribers: plain properties plus accessors for
/// the derived resources and the click action.
#[derive(Clone)]
pub struct WindowState {
    pub id: WindowId,
    pub title: String,
    pub is_minimized: bool,
    pub bundle_id: String,
    pub display_id: DisplayId,
    handle: Rc<dyn WindowHandle>,
    platform: Rc<dyn PlatformProvider>,
    caches: Rc<RefCell<ResourceCaches>>,
}

impl WindowState {
    pub fn new(
        window: &Window,
        platform: Rc<dyn PlatformProvider>,
        caches: Rc<RefCell<ResourceCaches>>,
    ) -> WindowState {
        WindowState {
            id: window.id,
            title: window.title.clone(),
            is_minimized: window.is_minimized,
            bundle_id: window.bundle_id.clone(),
            display_id: window.display_id,
            handle: window.handle.clone(),
            platform,
            caches,
        }
    }

    pub fn app_icon(&self) -> Image {
        let platform = &self.platform;
        self.caches.borrow_mut().icons.get(&self.bundle_id, |bundle_id| platform.app_icon(bundle_id))
    }

    /// The window's thumbnail. For a minimized window this is the last image
    /// captured while it was visible.
    pub fn snapshot(&self) -> Image {
        let handle = &self.handle;
        self.caches.borrow_mut().snapshots.get(self.id, self.is_minimized, || {
            handle.capture_snapshot()
        })
    }

    /// Minimizes the focused window, restores a minimized one, and focuses
    /// anything else.
    pub fn on_click(&self) {
        // The state may be up to one tick old.
        let minimized = self.handle.is_minimized().unwrap_or(self.is_minimized);
        let result = if minimized {
            debug!(window_id = %self.id, "restoring minimized window");
            self.handle.unminimize().and_then(|()| self.handle.focus())
        } else if self.platform.focused_window() == Some(self.id) {
            debug!(window_id = %self.id, "minimizing focused window");
            // The refresh loop cannot see this transition until its next
            // tick, so capture now while the window is still drawable.
            let handle = &self.handle;
            self.caches
                .borrow_mut()
                .snapshots
                .capture_before_minimize(self.id, || handle.capture_snapshot());
            self.handle.minimize()
        } else {
            debug!(window_id = %self.id, "focusing window");
            self.handle.focus().and_then(|()| self.handle.raise())
        };

        if let Err(err) = result {
            warn!(window_id = %self.id, %err, "click action failed");
        }
    }
}

impl fmt::Debug for WindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowState")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("is_minimized", &self.is_minimized)
            .field("bundle_id", &self.bundle_id)
            .field("display_id", &self.display_id)
            .finish_non_exhaustive()
    }
}
