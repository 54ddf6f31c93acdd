use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect { x, y, width, height }
    }

    pub fn max_x(&self) -> f64 { self.x + self.width }

    /// Whether moving a button from `self` to `other` would be visible.
    ///
    /// Frames are compared at half-point resolution so float noise from the
    /// slot division does not trigger redraws.
    pub fn differs_visibly(&self, other: &Rect) -> bool {
        let quant = |v: f64| -> i64 { (v * 2.0).round() as i64 };
        quant(self.x) != quant(other.x)
            || quant(self.y) != quant(other.y)
            || quant(self.width) != quant(other.width)
            || quant(self.height) != quant(other.height)
    }
}
