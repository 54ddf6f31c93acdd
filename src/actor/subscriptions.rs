use tracing::{debug, info};

use crate::actor::broadcast::UpdateCallback;
use crate::sys::screen::DisplayId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    display_id: DisplayId,
    callback: UpdateCallback,
}

/// Per-display subscribers, in registration order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn subscribe(&mut self, display_id: DisplayId, callback: UpdateCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration { id, display_id, callback });
        info!(?id, %display_id, total = self.registrations.len(), "subscriber added");
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        let removed = self.registrations.len() != before;
        if removed {
            info!(?id, total = self.registrations.len(), "subscriber removed");
        } else {
            debug!(?id, "unsubscribe for unknown subscription ignored");
        }
        removed
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.registrations.iter().any(|r| r.id == id)
    }

    pub fn len(&self) -> usize { self.registrations.len() }

    pub fn is_empty(&self) -> bool { self.registrations.is_empty() }

    /// Copies out the registrations so callbacks can run without the registry
    /// borrowed; a callback may subscribe or unsubscribe.
    pub fn snapshot(&self) -> Vec<(SubscriptionId, DisplayId, UpdateCallback)> {
        self.registrations
            .iter()
            .map(|r| (r.id, r.display_id, r.callback.clone()))
            .collect()
    }
}
