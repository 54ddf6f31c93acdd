use serde::{Deserialize, Serialize};

use crate::model::window::{WindowId, WindowState};
use crate::sys::geometry::Rect;
use crate::sys::screen::DisplayId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowData {
    pub id: WindowId,
    pub title: String,
    pub is_minimized: bool,
    pub bundle_id: Option<String>,
    pub frame: Rect,
}

impl WindowData {
    pub fn new(state: &WindowState, frame: Rect) -> Self {
        Self {
            id: state.id,
            title: state.title.clone(),
            is_minimized: state.is_minimized,
            bundle_id: (!state.bundle_id.is_empty()).then(|| state.bundle_id.clone()),
            frame,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayData {
    pub display_id: DisplayId,
    pub window_count: usize,
    /// Buttons in on-screen order.
    pub windows: Vec<WindowData>,
}
