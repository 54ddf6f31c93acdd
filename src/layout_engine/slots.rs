use crate::common::config::TaskbarSettings;
use crate::sys::geometry::Rect;

/// Horizontal slot geometry for one display's taskbar.
///
/// Every button gets the same slot width, `min(max_button_width,
/// available_width / count)`, so the geometry of every slot depends on the
/// final button count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotLayout {
    /// Area of the bar reserved for window buttons.
    pub bounds: Rect,
    pub max_button_width: f64,
    /// Gap left at the right edge of each slot.
    pub spacing: f64,
}

impl SlotLayout {
    pub fn new(bounds: Rect, max_button_width: f64, spacing: f64) -> Self {
        Self { bounds, max_button_width, spacing }
    }

    /// Buttons span the full `width` of the bar, at the configured height.
    pub fn from_settings(x: f64, y: f64, width: f64, settings: &TaskbarSettings) -> Self {
        Self::new(
            Rect::new(x, y, width, settings.button_height),
            settings.max_button_width,
            settings.spacing,
        )
    }

    pub fn slot_width(&self, count: usize) -> f64 {
        if count == 0 {
            return 0.0;
        }
        let share = self.bounds.width.max(0.0) / count as f64;
        share.min(self.max_button_width)
    }

    pub fn frame(&self, index: usize, count: usize) -> Rect {
        let slot = self.slot_width(count);
        Rect::new(
            self.bounds.x + slot * index as f64,
            self.bounds.y,
            (slot - self.spacing).max(0.0),
            self.bounds.height,
        )
    }
}
