//! A scripted [`PlatformProvider`].
//!
//! The platform serves one [`Frame`] at a time: the applications, windows,
//! lock state and focus the host would report. Frames come from a JSON
//! script (the `replay` command) or are edited in place by tests. Handles
//! read the current frame on every call, like live host objects do, and host
//! actions are recorded instead of performed.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::window::WindowId;
use crate::sys::platform::{ApplicationHandle, HostError, Image, PlatformProvider, WindowHandle};
use crate::sys::screen::DisplayId;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed script: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub host_bundle_id: Option<String>,
    pub frames: Vec<Frame>,
}

impl Script {
    pub fn read(path: &Path) -> Result<Script, ScriptError> {
        let buf = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> Result<Script, ScriptError> { Ok(serde_json::from_str(buf)?) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Frame {
    pub locked: bool,
    pub focused: Option<WindowId>,
    pub applications: Vec<AppScript>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppScript {
    pub bundle_id: Option<String>,
    /// The application fails every window query.
    pub unavailable: bool,
    pub windows: Vec<WindowScript>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowScript {
    pub id: WindowId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default = "default_display")]
    pub display: DisplayId,
    #[serde(default = "default_subrole")]
    pub subrole: Option<String>,
}

fn default_display() -> DisplayId { DisplayId::new(1) }

fn default_subrole() -> Option<String> { Some("AXStandardWindow".to_string()) }

impl WindowScript {
    pub fn new(id: u32, title: &str) -> Self {
        Self {
            id: WindowId::new(id),
            title: title.to_string(),
            minimized: false,
            display: default_display(),
            subrole: default_subrole(),
        }
    }

    pub fn on_display(mut self, display: u32) -> Self {
        self.display = DisplayId::new(display);
        self
    }

    pub fn minimized(mut self) -> Self {
        self.minimized = true;
        self
    }

    pub fn without_subrole(mut self) -> Self {
        self.subrole = None;
        self
    }
}

impl AppScript {
    pub fn new(bundle_id: &str, windows: Vec<WindowScript>) -> Self {
        Self {
            bundle_id: Some(bundle_id.to_string()),
            unavailable: false,
            windows,
        }
    }
}

/// Host calls that change window state, in the order they were made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Minimize(WindowId),
    Unminimize(WindowId),
    Raise(WindowId),
    Focus(WindowId),
    Capture(WindowId),
}

#[derive(Clone, Default)]
pub struct ScriptedPlatform(Rc<RefCell<ScriptState>>);

#[derive(Default)]
struct ScriptState {
    frame: Frame,
    host_bundle_id: Option<String>,
    actions: Vec<HostAction>,
    captures: u32,
    window_queries: usize,
    icon_queries: usize,
}

impl ScriptState {
    fn window(&self, id: WindowId) -> Option<&WindowScript> {
        self.frame.applications.iter().flat_map(|app| &app.windows).find(|w| w.id == id)
    }

    fn window_mut(&mut self, id: WindowId) -> Option<&mut WindowScript> {
        self.frame.applications.iter_mut().flat_map(|app| &mut app.windows).find(|w| w.id == id)
    }
}

impl ScriptedPlatform {
    pub fn new(frame: Frame) -> Self {
        let platform = Self::default();
        platform.set_frame(frame);
        platform
    }

    pub fn set_frame(&self, frame: Frame) { self.0.borrow_mut().frame = frame; }

    pub fn set_host_bundle_id(&self, bundle_id: Option<String>) {
        self.0.borrow_mut().host_bundle_id = bundle_id;
    }

    pub fn set_locked(&self, locked: bool) { self.0.borrow_mut().frame.locked = locked; }

    pub fn set_focused(&self, id: Option<WindowId>) { self.0.borrow_mut().frame.focused = id; }

    pub fn set_title(&self, id: WindowId, title: &str) {
        if let Some(w) = self.0.borrow_mut().window_mut(id) {
            w.title = title.to_string();
        }
    }

    pub fn set_minimized(&self, id: WindowId, minimized: bool) {
        if let Some(w) = self.0.borrow_mut().window_mut(id) {
            w.minimized = minimized;
        }
    }

    pub fn set_display(&self, id: WindowId, display: DisplayId) {
        if let Some(w) = self.0.borrow_mut().window_mut(id) {
            w.display = display;
        }
    }

    /// Appends a window to the application at `app_index`.
    pub fn add_window(&self, app_index: usize, window: WindowScript) {
        if let Some(app) = self.0.borrow_mut().frame.applications.get_mut(app_index) {
            app.windows.push(window);
        }
    }

    pub fn remove_window(&self, id: WindowId) {
        for app in &mut self.0.borrow_mut().frame.applications {
            app.windows.retain(|w| w.id != id);
        }
    }

    pub fn actions(&self) -> Vec<HostAction> { self.0.borrow().actions.clone() }

    /// Number of `ApplicationHandle::windows` calls served.
    pub fn window_queries(&self) -> usize { self.0.borrow().window_queries }

    pub fn icon_queries(&self) -> usize { self.0.borrow().icon_queries }

    fn record(&self, action: HostAction) { self.0.borrow_mut().actions.push(action); }
}

impl PlatformProvider for ScriptedPlatform {
    fn running_applications(&self) -> Result<Vec<Rc<dyn ApplicationHandle>>, HostError> {
        let count = self.0.borrow().frame.applications.len();
        Ok((0..count)
            .map(|index| {
                Rc::new(ScriptedApplication { platform: self.clone(), index })
                    as Rc<dyn ApplicationHandle>
            })
            .collect())
    }

    fn is_display_locked(&self) -> bool { self.0.borrow().frame.locked }

    fn app_icon(&self, bundle_id: &str) -> Option<Image> {
        self.0.borrow_mut().icon_queries += 1;
        Some(Image::new(1, 1, bundle_id.as_bytes().to_vec()))
    }

    fn focused_window(&self) -> Option<WindowId> { self.0.borrow().frame.focused }

    fn host_bundle_id(&self) -> Option<String> { self.0.borrow().host_bundle_id.clone() }
}

struct ScriptedApplication {
    platform: ScriptedPlatform,
    index: usize,
}

impl ScriptedApplication {
    fn script(&self) -> Option<AppScript> {
        self.platform.0.borrow().frame.applications.get(self.index).cloned()
    }
}

impl ApplicationHandle for ScriptedApplication {
    fn bundle_id(&self) -> Option<String> { self.script().and_then(|app| app.bundle_id) }

    fn windows(&self) -> Result<Vec<Rc<dyn WindowHandle>>, HostError> {
        self.platform.0.borrow_mut().window_queries += 1;
        let app = self
            .script()
            .ok_or_else(|| HostError::ApplicationUnavailable(format!("#{}", self.index)))?;
        if app.unavailable {
            return Err(HostError::ApplicationUnavailable(app.bundle_id.unwrap_or_default()));
        }
        Ok(app
            .windows
            .iter()
            .map(|w| {
                Rc::new(ScriptedWindow {
                    platform: self.platform.clone(),
                    id: w.id,
                    bundle_id: app.bundle_id.clone(),
                }) as Rc<dyn WindowHandle>
            })
            .collect())
    }
}

struct ScriptedWindow {
    platform: ScriptedPlatform,
    id: WindowId,
    bundle_id: Option<String>,
}

impl ScriptedWindow {
    fn read<T>(&self, f: impl FnOnce(&WindowScript) -> T) -> Result<T, HostError> {
        self.platform.0.borrow().window(self.id).map(f).ok_or(HostError::WindowGone(self.id))
    }

    fn write(&self, f: impl FnOnce(&mut WindowScript)) -> Result<(), HostError> {
        self.platform
            .0
            .borrow_mut()
            .window_mut(self.id)
            .map(f)
            .ok_or(HostError::WindowGone(self.id))
    }
}

impl WindowHandle for ScriptedWindow {
    fn id(&self) -> WindowId { self.id }

    fn title(&self) -> Result<String, HostError> { self.read(|w| w.title.clone()) }

    fn is_minimized(&self) -> Result<bool, HostError> { self.read(|w| w.minimized) }

    fn bundle_id(&self) -> Option<String> { self.bundle_id.clone() }

    fn display_id(&self) -> Result<DisplayId, HostError> { self.read(|w| w.display) }

    fn subrole(&self) -> Option<String> { self.read(|w| w.subrole.clone()).ok().flatten() }

    fn minimize(&self) -> Result<(), HostError> {
        self.write(|w| w.minimized = true)?;
        self.platform.record(HostAction::Minimize(self.id));
        Ok(())
    }

    fn unminimize(&self) -> Result<(), HostError> {
        self.write(|w| w.minimized = false)?;
        self.platform.record(HostAction::Unminimize(self.id));
        Ok(())
    }

    fn raise(&self) -> Result<(), HostError> {
        self.read(|_| ())?;
        self.platform.record(HostAction::Raise(self.id));
        Ok(())
    }

    fn focus(&self) -> Result<(), HostError> {
        self.read(|_| ())?;
        self.platform.set_focused(Some(self.id));
        self.platform.record(HostAction::Focus(self.id));
        Ok(())
    }

    fn capture_snapshot(&self) -> Result<Image, HostError> {
        let minimized = self.read(|w| w.minimized)?;
        self.platform.record(HostAction::Capture(self.id));
        if minimized {
            return Ok(Image::empty());
        }
        let mut state = self.platform.0.borrow_mut();
        state.captures += 1;
        Ok(Image::new(1, 1, state.captures.to_le_bytes().to_vec()))
    }
}
