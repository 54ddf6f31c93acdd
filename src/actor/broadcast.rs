use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::model::window::WindowState;
use crate::sys::screen::DisplayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// A list-loop pass completed: windows may have appeared or disappeared.
    WindowsChanged,
    /// A state-loop tick: same windows, fresh titles and minimized flags.
    StatesRefreshed,
}

/// What a subscriber receives: the windows currently on its display.
#[derive(Debug, Clone)]
pub struct WindowListUpdate {
    pub kind: UpdateKind,
    pub display_id: DisplayId,
    pub windows: Vec<WindowState>,
}

pub type UpdateCallback = Rc<dyn Fn(&WindowListUpdate)>;
