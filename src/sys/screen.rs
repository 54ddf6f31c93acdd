use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a physical display. A window's display changes when the user
/// drags it across screens.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct DisplayId(u32);

impl DisplayId {
    pub fn new(id: u32) -> DisplayId { DisplayId(id) }

    pub fn get(&self) -> u32 { self.0 }
}

impl From<DisplayId> for u32 {
    fn from(id: DisplayId) -> u32 { id.get() }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
