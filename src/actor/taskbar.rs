//! Button lifecycle for one display's taskbar.
//!
//! Owns the mapping from window id to on-screen button. Window list updates
//! are diffed against the tracked order so existing buttons keep their
//! relative positions; state refreshes only re-render buttons whose title or
//! minimized flag actually changed.

use tracing::{debug, instrument, trace};

use crate::actor::broadcast::{UpdateKind, WindowListUpdate};
use crate::common::collections::HashMap;
use crate::layout_engine::SlotLayout;
use crate::model::reconcile;
use crate::model::server::{DisplayData, WindowData};
use crate::model::window::{WindowId, WindowState};
use crate::sys::geometry::Rect;
use crate::sys::screen::DisplayId;

/// An on-screen button. Drawing is up to the implementation.
pub trait TaskbarButton {
    fn set_frame(&mut self, frame: Rect);
    /// Re-render with a new title or minimized flag.
    fn update(&mut self, state: &WindowState);
    fn teardown(&mut self);
}

pub trait ButtonFactory {
    type Button: TaskbarButton;

    /// Builds a button for a newly tracked window. `state` carries the click
    /// handler ([`WindowState::on_click`]).
    fn create(&mut self, frame: Rect, state: &WindowState) -> Self::Button;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub created: usize,
    pub moved: usize,
    pub updated: usize,
    pub removed: usize,
}

struct TrackedWindow<B> {
    button: B,
    frame: Rect,
    state: WindowState,
}

pub struct Taskbar<F: ButtonFactory> {
    display_id: DisplayId,
    layout: SlotLayout,
    factory: F,
    /// Tracked ids in on-screen order; always the key set of `tracked`.
    order: Vec<WindowId>,
    tracked: HashMap<WindowId, TrackedWindow<F::Button>>,
}

impl<F: ButtonFactory> Taskbar<F> {
    pub fn new(display_id: DisplayId, layout: SlotLayout, factory: F) -> Self {
        Self {
            display_id,
            layout,
            factory,
            order: Vec::new(),
            tracked: HashMap::default(),
        }
    }

    pub fn display_id(&self) -> DisplayId { self.display_id }

    pub fn window_ids(&self) -> &[WindowId] { &self.order }

    pub fn len(&self) -> usize { self.order.len() }

    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    pub fn frame(&self, id: WindowId) -> Option<Rect> { self.tracked.get(&id).map(|t| t.frame) }

    pub fn state(&self, id: WindowId) -> Option<&WindowState> {
        self.tracked.get(&id).map(|t| &t.state)
    }

    pub fn button(&self, id: WindowId) -> Option<&F::Button> {
        self.tracked.get(&id).map(|t| &t.button)
    }

    pub fn factory(&self) -> &F { &self.factory }

    /// Routes a subscriber update. Updates for other displays are ignored.
    pub fn handle_update(&mut self, update: &WindowListUpdate) -> ApplyStats {
        if update.display_id != self.display_id {
            trace!(display = %update.display_id, "ignoring update for another display");
            return ApplyStats::default();
        }
        match update.kind {
            UpdateKind::WindowsChanged => self.apply_window_list(&update.windows),
            UpdateKind::StatesRefreshed => self.refresh_states(&update.windows),
        }
    }

    /// Reconciles buttons against a new window list for this display.
    #[instrument(name = "taskbar::apply_window_list", skip_all, fields(display = %self.display_id))]
    pub fn apply_window_list(&mut self, windows: &[WindowState]) -> ApplyStats {
        let current: Vec<WindowId> = windows.iter().map(|w| w.id).collect();
        let by_id: HashMap<WindowId, &WindowState> = windows.iter().map(|w| (w.id, w)).collect();
        let diff = reconcile::diff(&self.order, &current);
        let mut stats = ApplyStats::default();

        for id in &diff.disappeared {
            if let Some(mut tracked) = self.tracked.remove(id) {
                tracked.button.teardown();
                stats.removed += 1;
            }
        }

        // Slot width depends on the final count, so it is fixed before any
        // button is placed or moved.
        let total = diff.total();

        for (index, id) in diff.still_present.iter().enumerate() {
            let frame = self.layout.frame(index, total);
            let Some(tracked) = self.tracked.get_mut(id) else { continue };
            if tracked.frame.differs_visibly(&frame) {
                tracked.button.set_frame(frame);
                tracked.frame = frame;
                stats.moved += 1;
            }
            if let Some(&state) = by_id.get(id) {
                if needs_render(&tracked.state, state) {
                    tracked.button.update(state);
                    stats.updated += 1;
                }
                tracked.state = state.clone();
            }
        }

        let base = diff.still_present.len();
        for (offset, id) in diff.appeared.iter().enumerate() {
            let Some(&state) = by_id.get(id) else { continue };
            let frame = self.layout.frame(base + offset, total);
            let button = self.factory.create(frame, state);
            self.tracked.insert(*id, TrackedWindow { button, frame, state: state.clone() });
            stats.created += 1;
        }

        self.order = diff.next_order();
        if stats != ApplyStats::default() {
            debug!(?stats, buttons = self.order.len(), "applied window list");
        }
        stats
    }

    /// Re-renders tracked buttons whose title or minimized flag changed.
    /// Windows not yet tracked wait for the next window list.
    pub fn refresh_states(&mut self, windows: &[WindowState]) -> ApplyStats {
        let mut stats = ApplyStats::default();
        for state in windows {
            let Some(tracked) = self.tracked.get_mut(&state.id) else { continue };
            if needs_render(&tracked.state, state) {
                trace!(window_id = %state.id, title = %state.title, "window state changed");
                tracked.button.update(state);
                stats.updated += 1;
            }
            tracked.state = state.clone();
        }
        stats
    }

    /// Switches to new bar geometry, e.g. after the display was resized.
    pub fn set_layout(&mut self, layout: SlotLayout) -> ApplyStats {
        self.layout = layout;
        let total = self.order.len();
        let mut stats = ApplyStats::default();
        for (index, id) in self.order.iter().enumerate() {
            let frame = self.layout.frame(index, total);
            let Some(tracked) = self.tracked.get_mut(id) else { continue };
            if tracked.frame.differs_visibly(&frame) {
                tracked.button.set_frame(frame);
                tracked.frame = frame;
                stats.moved += 1;
            }
        }
        stats
    }

    /// Tears down every button.
    pub fn clear(&mut self) {
        for id in self.order.drain(..) {
            if let Some(mut tracked) = self.tracked.remove(&id) {
                tracked.button.teardown();
            }
        }
        debug!(display = %self.display_id, "cleared taskbar");
    }

    pub fn to_display_data(&self) -> DisplayData {
        let windows: Vec<WindowData> = self
            .order
            .iter()
            .filter_map(|id| self.tracked.get(id))
            .map(|t| WindowData::new(&t.state, t.frame))
            .collect();
        DisplayData {
            display_id: self.display_id,
            window_count: windows.len(),
            windows,
        }
    }
}

fn needs_render(old: &WindowState, new: &WindowState) -> bool {
    old.title != new.title || old.is_minimized != new.is_minimized
}
