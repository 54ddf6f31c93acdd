//! The window watcher service.
//!
//! Runs two independent poll loops on the injected [`Scheduler`]:
//!
//! * the list loop runs an [`Enumerator`] pass, and on a valid result replaces
//!   the current window list and sends [`UpdateKind::WindowsChanged`] to every
//!   subscriber;
//! * the state loop re-reads every known window, one window per scheduled
//!   step, and sends [`UpdateKind::StatesRefreshed`], so renames and minimize
//!   toggles show up between passes.
//!
//! Both loops run exactly while at least one subscriber is registered. Every
//! scheduled callback carries the generation it was started under and does
//! nothing once the watcher has been stopped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, info, instrument, trace};

use crate::actor::broadcast::{UpdateKind, WindowListUpdate};
use crate::actor::enumerator::{Enumerator, WindowFilter};
use crate::actor::subscriptions::{SubscriptionId, SubscriptionRegistry};
use crate::common::config::{ConfigError, Settings};
use crate::model::cache::ResourceCaches;
use crate::model::window::{EnumerationResult, Window, WindowList, WindowState};
use crate::sys::platform::PlatformProvider;
use crate::sys::scheduler::{Scheduler, TimerId};
use crate::sys::screen::DisplayId;

#[derive(Clone)]
pub struct WindowWatcher(Rc<Inner>);

struct Inner {
    platform: Rc<dyn PlatformProvider>,
    scheduler: Rc<dyn Scheduler>,
    enumerator: Enumerator,
    caches: Rc<RefCell<ResourceCaches>>,
    login_bundle_id: String,
    chunk_interval: Duration,
    state: RefCell<State>,
}

struct State {
    subscriptions: SubscriptionRegistry,
    windows: WindowList,
    running: bool,
    generation: u64,
    list_interval: Duration,
    state_interval: Duration,
    list_timer: Option<TimerId>,
    /// The next state tick, or the next step of the refresh in progress.
    state_timer: Option<TimerId>,
    refresh: Option<Refresh>,
    completed_passes: u64,
}

/// A state refresh in progress. `source` is the list it started from;
/// `done` holds the re-read prefix of it.
struct Refresh {
    source: WindowList,
    done: Vec<Window>,
}

impl WindowWatcher {
    pub fn new(
        settings: &Settings,
        platform: Rc<dyn PlatformProvider>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Result<Self, ConfigError> {
        let filter = WindowFilter::from_settings(&settings.filter, platform.host_bundle_id())?;
        let chunk_interval = settings.chunk_interval()?;
        let enumerator =
            Enumerator::new(platform.clone(), scheduler.clone(), filter, chunk_interval);
        Ok(WindowWatcher(Rc::new(Inner {
            platform,
            scheduler,
            enumerator,
            caches: Rc::new(RefCell::new(ResourceCaches::new(settings.capture_snapshots))),
            login_bundle_id: settings.filter.login_bundle_id.clone(),
            chunk_interval,
            state: RefCell::new(State {
                subscriptions: SubscriptionRegistry::new(),
                windows: WindowList::default(),
                running: false,
                generation: 0,
                list_interval: settings.window_list_poll_interval()?,
                state_interval: settings.window_state_poll_interval()?,
                list_timer: None,
                state_timer: None,
                refresh: None,
                completed_passes: 0,
            }),
        })))
    }

    /// Registers `callback` for windows on `display_id`. The first
    /// subscriber starts both poll loops.
    pub fn subscribe(
        &self,
        display_id: DisplayId,
        callback: impl Fn(&WindowListUpdate) + 'static,
    ) -> Subscription {
        let (id, first) = {
            let mut state = self.0.state.borrow_mut();
            let id = state.subscriptions.subscribe(display_id, Rc::new(callback));
            (id, state.subscriptions.len() == 1)
        };
        if first {
            self.start();
        }
        Subscription {
            watcher: Rc::downgrade(&self.0),
            id: Some(id),
        }
    }

    /// Removes a subscriber. Removing the last one stops both poll loops.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let now_empty = {
            let mut state = self.0.state.borrow_mut();
            state.subscriptions.unsubscribe(id) && state.subscriptions.is_empty()
        };
        if now_empty {
            self.stop();
        }
    }

    /// Affects the next scheduled list tick onwards.
    pub fn set_window_list_poll_interval(&self, interval: Duration) {
        self.0.state.borrow_mut().list_interval = interval;
    }

    /// Affects the next scheduled state tick onwards.
    pub fn set_window_state_poll_interval(&self, interval: Duration) {
        self.0.state.borrow_mut().state_interval = interval;
    }

    /// The list from the last accepted pass.
    pub fn current_windows(&self) -> WindowList { self.0.state.borrow().windows.clone() }

    pub fn is_polling(&self) -> bool { self.0.state.borrow().running }

    pub fn subscriber_count(&self) -> usize { self.0.state.borrow().subscriptions.len() }

    /// Passes that reported while polling, valid or not.
    pub fn completed_passes(&self) -> u64 { self.0.state.borrow().completed_passes }

    pub fn caches(&self) -> Rc<RefCell<ResourceCaches>> { self.0.caches.clone() }

    fn start(&self) {
        let (generation, state_interval) = {
            let mut state = self.0.state.borrow_mut();
            if state.running {
                return;
            }
            state.running = true;
            state.generation += 1;
            (state.generation, state.state_interval)
        };
        info!(generation, "starting window poll loops");
        self.schedule_list_tick(Duration::ZERO, generation);
        self.schedule_state_tick(state_interval, generation);
    }

    fn stop(&self) {
        let timers = {
            let mut state = self.0.state.borrow_mut();
            if !state.running {
                return;
            }
            state.running = false;
            state.generation += 1;
            state.refresh = None;
            [state.list_timer.take(), state.state_timer.take()]
        };
        for timer in timers.into_iter().flatten() {
            self.0.scheduler.cancel(timer);
        }
        self.0.enumerator.cancel();
        info!("stopped window poll loops");
    }

    fn is_live(&self, generation: u64) -> bool {
        let state = self.0.state.borrow();
        state.running && state.generation == generation
    }

    fn schedule_list_tick(&self, delay: Duration, generation: u64) {
        let weak = Rc::downgrade(&self.0);
        let timer = self.0.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    WindowWatcher(inner).list_tick(generation);
                }
            }),
        );
        self.0.state.borrow_mut().list_timer = Some(timer);
    }

    fn schedule_state_tick(&self, delay: Duration, generation: u64) {
        self.schedule_state_task(delay, move |watcher| watcher.state_tick(generation));
    }

    fn schedule_state_task(&self, delay: Duration, f: impl FnOnce(WindowWatcher) + 'static) {
        let weak = Rc::downgrade(&self.0);
        let timer = self.0.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    f(WindowWatcher(inner));
                }
            }),
        );
        self.0.state.borrow_mut().state_timer = Some(timer);
    }

    fn list_tick(&self, generation: u64) {
        if !self.is_live(generation) {
            return;
        }
        self.0.state.borrow_mut().list_timer = None;

        let weak = Rc::downgrade(&self.0);
        let started = self.0.enumerator.start(Box::new(move |result| {
            if let Some(inner) = weak.upgrade() {
                WindowWatcher(inner).on_enumerated(generation, result);
            }
        }));
        if !started {
            // The pass in flight reschedules the loop when it reports.
            trace!("list tick found a pass in flight");
        }
    }

    #[instrument(name = "window_watcher::on_enumerated", skip_all, fields(valid = result.is_valid))]
    fn on_enumerated(&self, generation: u64, result: EnumerationResult) {
        if !self.is_live(generation) {
            trace!("discarding pass finished after stop");
            return;
        }
        self.0.state.borrow_mut().completed_passes += 1;

        if !result.is_valid {
            debug!("display locked during pass, discarding result");
        } else if self.is_degenerate(&result.windows) {
            debug!(windows = result.windows.len(), "suppressing empty or lock-screen-only list");
        } else {
            self.publish(result.windows);
        }

        // A subscriber callback may have unsubscribed everyone.
        if self.is_live(generation) {
            let interval = self.0.state.borrow().list_interval;
            self.schedule_list_tick(interval, generation);
        }
    }

    /// An empty list, or one made only of the login window, shows up while
    /// the screen locks or unlocks. Publishing it would flash an empty bar.
    fn is_degenerate(&self, windows: &[Window]) -> bool {
        windows.iter().all(|w| w.bundle_id == self.0.login_bundle_id)
    }

    fn publish(&self, windows: Vec<Window>) {
        self.0.caches.borrow_mut().evict_stale(&windows);
        let list = WindowList::from(windows);
        self.0.state.borrow_mut().windows = list.clone();
        self.notify(UpdateKind::WindowsChanged, &list);
    }

    fn state_tick(&self, generation: u64) {
        if !self.is_live(generation) {
            return;
        }
        {
            let mut state = self.0.state.borrow_mut();
            state.state_timer = None;
            let source = state.windows.clone();
            state.refresh = Some(Refresh { done: Vec::with_capacity(source.len()), source });
        }
        self.refresh_step(generation);
    }

    /// Re-reads one window of the refresh in progress, then yields.
    fn refresh_step(&self, generation: u64) {
        if !self.is_live(generation) {
            return;
        }
        let next = {
            let mut state = self.0.state.borrow_mut();
            state.state_timer = None;
            let Some(refresh) = state.refresh.take() else { return };
            if !refresh.source.ptr_eq(&state.windows) {
                // A pass published a new list; its own notification is newer
                // than anything this refresh could report.
                None
            } else {
                let next = refresh.source.get(refresh.done.len()).cloned();
                state.refresh = Some(refresh);
                Some(next)
            }
        };

        let window = match next {
            None => {
                trace!("window list replaced mid-refresh, dropping refresh");
                let interval = self.0.state.borrow().state_interval;
                self.schedule_state_tick(interval, generation);
                return;
            }
            Some(None) => return self.finish_refresh(generation),
            Some(Some(window)) => window.refreshed(),
        };

        self.0.caches.borrow_mut().snapshots.refresh(window.id, window.is_minimized, || {
            window.handle.capture_snapshot()
        });
        let complete = {
            let mut state = self.0.state.borrow_mut();
            let Some(refresh) = state.refresh.as_mut() else { return };
            refresh.done.push(window);
            refresh.done.len() == refresh.source.len()
        };
        if complete {
            self.finish_refresh(generation);
        } else {
            let chunk = self.0.chunk_interval;
            self.schedule_state_task(chunk, move |watcher| watcher.refresh_step(generation));
        }
    }

    fn finish_refresh(&self, generation: u64) {
        let (refreshed, interval) = {
            let mut state = self.0.state.borrow_mut();
            let Some(refresh) = state.refresh.take() else { return };
            let refreshed = WindowList::from(refresh.done);
            state.windows = refreshed.clone();
            (refreshed, state.state_interval)
        };
        self.notify(UpdateKind::StatesRefreshed, &refreshed);

        if self.is_live(generation) {
            self.schedule_state_tick(interval, generation);
        }
    }

    fn notify(&self, kind: UpdateKind, list: &WindowList) {
        let subscribers = self.0.state.borrow().subscriptions.snapshot();
        trace!(?kind, subscribers = subscribers.len(), windows = list.len(), "notifying");
        for (id, display_id, callback) in subscribers {
            // An earlier callback may have removed this subscriber.
            if !self.0.state.borrow().subscriptions.contains(id) {
                continue;
            }
            let windows = list
                .on_display(display_id)
                .map(|w| WindowState::new(w, self.0.platform.clone(), self.0.caches.clone()))
                .collect();
            callback(&WindowListUpdate { kind, display_id, windows });
        }
    }
}

/// A live subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    watcher: Weak<Inner>,
    id: Option<SubscriptionId>,
}

impl Subscription {
    pub fn id(&self) -> Option<SubscriptionId> { self.id }

    pub fn unsubscribe(mut self) { self.release(); }

    fn release(&mut self) {
        if let Some(id) = self.id.take()
            && let Some(inner) = self.watcher.upgrade()
        {
            WindowWatcher(inner).unsubscribe(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) { self.release(); }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::config::Config;
    use crate::model::window::WindowId;
    use crate::sys::replay::{AppScript, Frame, ScriptedPlatform, WindowScript};
    use crate::sys::scheduler::ManualScheduler;

    const LIST: Duration = Duration::from_secs(2);
    const STATE: Duration = Duration::from_secs(1);
    const CHUNK: Duration = Duration::from_millis(10);

    fn watcher(apps: Vec<AppScript>) -> (WindowWatcher, ScriptedPlatform, ManualScheduler) {
        watcher_with(&Config::default().settings, apps)
    }

    fn watcher_with(
        settings: &Settings,
        apps: Vec<AppScript>,
    ) -> (WindowWatcher, ScriptedPlatform, ManualScheduler) {
        let platform = ScriptedPlatform::new(Frame { applications: apps, ..Frame::default() });
        let scheduler = ManualScheduler::new();
        let watcher =
            WindowWatcher::new(settings, Rc::new(platform.clone()), Rc::new(scheduler.clone()))
                .unwrap();
        (watcher, platform, scheduler)
    }

    type Updates = Rc<RefCell<Vec<(UpdateKind, Vec<u32>)>>>;

    fn record(watcher: &WindowWatcher, display: u32) -> (Subscription, Updates) {
        let updates = Updates::default();
        let u = updates.clone();
        let sub = watcher.subscribe(DisplayId::new(display), move |update| {
            let ids = update.windows.iter().map(|w| w.id.get()).collect();
            u.borrow_mut().push((update.kind, ids));
        });
        (sub, updates)
    }

    fn kinds(updates: &Updates, kind: UpdateKind) -> Vec<Vec<u32>> {
        updates.borrow().iter().filter(|(k, _)| *k == kind).map(|(_, ids)| ids.clone()).collect()
    }

    #[test]
    fn unrepresentable_interval_is_an_error_not_a_panic() {
        let settings = Settings { window_list_poll_interval: 1e30, ..Settings::default() };
        let platform = ScriptedPlatform::default();
        let result = WindowWatcher::new(
            &settings,
            Rc::new(platform),
            Rc::new(ManualScheduler::new()),
        );
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "window_list_poll_interval", .. })
        ));
    }

    #[test]
    fn no_subscribers_schedules_nothing() {
        let (watcher, _platform, scheduler) = watcher(vec![AppScript::new("a", vec![WindowScript::new(1, "x")])]);
        scheduler.advance(LIST * 5);
        assert_eq!(scheduler.scheduled_count(), 0);
        assert!(!watcher.is_polling());
    }

    #[test_log::test]
    fn first_subscriber_starts_both_loops_and_last_stops_them() {
        let (watcher, _platform, scheduler) = watcher(vec![AppScript::new("a", vec![WindowScript::new(1, "x")])]);

        let (first, _) = record(&watcher, 1);
        assert_eq!(scheduler.scheduled_count(), 2);
        assert_eq!(scheduler.pending(), 2);

        let (second, _) = record(&watcher, 2);
        assert_eq!(scheduler.scheduled_count(), 2);

        drop(first);
        assert!(watcher.is_polling());
        second.unsubscribe();
        assert!(!watcher.is_polling());
        assert_eq!(scheduler.pending(), 0);

        let before = scheduler.scheduled_count();
        scheduler.advance(LIST * 5);
        assert_eq!(scheduler.scheduled_count(), before);
    }

    #[test]
    fn valid_pass_notifies_display_filtered_lists() {
        let (watcher, _platform, scheduler) = watcher(vec![
            AppScript::new("a", vec![WindowScript::new(1, "one"), WindowScript::new(2, "two").on_display(2)]),
            AppScript::new("b", vec![WindowScript::new(3, "three")]),
        ]);
        let (_s1, on_one) = record(&watcher, 1);
        let (_s2, on_two) = record(&watcher, 2);

        scheduler.advance(CHUNK * 2);

        assert_eq!(kinds(&on_one, UpdateKind::WindowsChanged), vec![vec![1, 3]]);
        assert_eq!(kinds(&on_two, UpdateKind::WindowsChanged), vec![vec![2]]);
        assert_eq!(watcher.current_windows().len(), 3);
    }

    #[test]
    fn invalid_pass_is_silent_but_loop_keeps_running() {
        let (watcher, platform, scheduler) = watcher(vec![AppScript::new("a", vec![WindowScript::new(1, "x")])]);
        watcher.set_window_state_poll_interval(LIST * 100);
        platform.set_locked(true);
        let (_sub, updates) = record(&watcher, 1);

        scheduler.advance(CHUNK);
        assert_eq!(watcher.completed_passes(), 1);
        assert!(updates.borrow().is_empty());

        scheduler.advance(LIST + CHUNK);
        assert_eq!(watcher.completed_passes(), 2);
        assert!(updates.borrow().is_empty());

        platform.set_locked(false);
        scheduler.advance(LIST + CHUNK);
        assert_eq!(watcher.completed_passes(), 3);
        assert_eq!(kinds(&updates, UpdateKind::WindowsChanged), vec![vec![1]]);
    }

    #[test]
    fn empty_and_login_only_lists_are_suppressed() {
        let (watcher, platform, scheduler) = watcher(vec![AppScript::new("a", vec![WindowScript::new(1, "x")])]);
        watcher.set_window_state_poll_interval(LIST * 100);
        let (_sub, updates) = record(&watcher, 1);
        scheduler.advance(CHUNK);
        assert_eq!(kinds(&updates, UpdateKind::WindowsChanged), vec![vec![1]]);

        platform.set_frame(Frame {
            applications: vec![AppScript::new("com.apple.loginwindow", vec![WindowScript::new(9, "")])],
            ..Frame::default()
        });
        scheduler.advance(LIST + CHUNK);
        platform.set_frame(Frame::default());
        scheduler.advance(LIST + CHUNK);

        assert_eq!(watcher.completed_passes(), 3);
        assert_eq!(kinds(&updates, UpdateKind::WindowsChanged).len(), 1);
        assert_eq!(watcher.current_windows()[0].id, WindowId::new(1));
    }

    #[test]
    fn state_loop_reports_renames_between_passes() {
        let (watcher, platform, scheduler) = watcher(vec![AppScript::new("a", vec![WindowScript::new(1, "before")])]);
        watcher.set_window_list_poll_interval(STATE * 100);
        let titles = Rc::new(RefCell::new(Vec::new()));
        let t = titles.clone();
        let _sub = watcher.subscribe(DisplayId::new(1), move |update| {
            if update.kind == UpdateKind::StatesRefreshed {
                t.borrow_mut().extend(update.windows.iter().map(|w| w.title.clone()));
            }
        });

        scheduler.advance(CHUNK);
        platform.set_title(WindowId::new(1), "after");
        scheduler.advance(STATE);

        assert_eq!(*titles.borrow(), vec!["after".to_string()]);
        assert_eq!(watcher.current_windows()[0].title, "after");
    }

    #[test]
    fn snapshot_of_minimized_window_comes_from_last_visible_tick() {
        let (watcher, platform, scheduler) = watcher(vec![AppScript::new("a", vec![WindowScript::new(1, "x")])]);
        let latest = Rc::new(RefCell::new(None));
        let l = latest.clone();
        let _sub = watcher.subscribe(DisplayId::new(1), move |update| {
            *l.borrow_mut() = update.windows.first().cloned();
        });

        scheduler.advance(CHUNK);
        scheduler.advance(STATE);
        let visible = watcher.caches().borrow().snapshots.peek(WindowId::new(1)).cloned().unwrap();

        platform.set_minimized(WindowId::new(1), true);
        scheduler.advance(STATE);

        let state = latest.borrow().clone().unwrap();
        assert!(state.is_minimized);
        assert_eq!(state.snapshot(), visible);
    }

    #[test]
    fn eviction_follows_accepted_passes() {
        let (watcher, platform, scheduler) = watcher(vec![
            AppScript::new("a", vec![WindowScript::new(1, "x")]),
            AppScript::new("b", vec![WindowScript::new(2, "y")]),
        ]);
        let latest = Rc::new(RefCell::new(Vec::new()));
        let l = latest.clone();
        let _sub = watcher.subscribe(DisplayId::new(1), move |update| {
            *l.borrow_mut() = update.windows.clone();
        });

        scheduler.advance(CHUNK * 2);
        for state in latest.borrow().iter() {
            state.app_icon();
            state.snapshot();
        }
        assert_eq!(watcher.caches().borrow().icons.len(), 2);
        assert_eq!(watcher.caches().borrow().snapshots.len(), 2);

        platform.remove_window(WindowId::new(2));
        scheduler.advance(LIST);
        scheduler.advance(CHUNK * 2);

        let caches = watcher.caches();
        let caches = caches.borrow();
        assert_eq!(caches.icons.len(), 1);
        assert_eq!(caches.snapshots.len(), 1);
        assert!(caches.snapshots.peek(WindowId::new(2)).is_none());
    }

    #[test]
    fn stop_mid_pass_drops_the_pass() {
        let (watcher, _platform, scheduler) = watcher(vec![
            AppScript::new("a", vec![WindowScript::new(1, "x")]),
            AppScript::new("b", vec![WindowScript::new(2, "y")]),
        ]);
        let (sub, updates) = record(&watcher, 1);

        scheduler.run_next(); // list tick
        scheduler.run_next(); // first application
        drop(sub);

        assert_eq!(scheduler.pending(), 0);
        scheduler.advance(LIST * 3);
        assert!(updates.borrow().is_empty());
        assert_eq!(watcher.completed_passes(), 0);

        // Restarting begins a fresh pass rather than resuming the old one.
        let (_sub, updates) = record(&watcher, 1);
        scheduler.advance(CHUNK * 2);
        assert_eq!(kinds(&updates, UpdateKind::WindowsChanged), vec![vec![1, 2]]);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let (watcher, _platform, scheduler) = watcher(vec![AppScript::new("a", vec![WindowScript::new(1, "x")])]);
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::default();
        let calls = Rc::new(Cell::new(0));

        let (s, c) = (slot.clone(), calls.clone());
        let sub = watcher.subscribe(DisplayId::new(1), move |_| {
            c.set(c.get() + 1);
            s.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(sub);

        scheduler.advance(CHUNK);
        assert_eq!(calls.get(), 1);
        assert!(!watcher.is_polling());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn click_minimizes_focused_window_after_capturing_it() {
        use crate::sys::replay::HostAction;

        let (watcher, platform, scheduler) = watcher(vec![AppScript::new("a", vec![WindowScript::new(1, "x")])]);
        watcher.set_window_state_poll_interval(LIST * 100);
        platform.set_focused(Some(WindowId::new(1)));
        let latest = Rc::new(RefCell::new(None));
        let l = latest.clone();
        let _sub = watcher.subscribe(DisplayId::new(1), move |update| {
            *l.borrow_mut() = update.windows.first().cloned();
        });
        scheduler.advance(CHUNK);

        let state: WindowState = latest.borrow().clone().unwrap();
        state.on_click();

        let id = WindowId::new(1);
        assert_eq!(platform.actions(), vec![HostAction::Capture(id), HostAction::Minimize(id)]);
        assert!(watcher.caches().borrow().snapshots.peek(id).is_some());
    }

    /// Three one-window applications and an empty fourth, scanned 400ms
    /// apart, so a pass spans several state ticks' worth of steps.
    fn slow_watcher(state_interval: Duration) -> (WindowWatcher, ScriptedPlatform, ManualScheduler) {
        let settings = Settings { chunk_interval: 0.4, ..Settings::default() };
        let fixture = watcher_with(&settings, vec![
            AppScript::new("a", vec![WindowScript::new(1, "one")]),
            AppScript::new("b", vec![WindowScript::new(2, "two")]),
            AppScript::new("c", vec![WindowScript::new(3, "three")]),
            AppScript::new("d", vec![]),
        ]);
        fixture.0.set_window_state_poll_interval(state_interval);
        fixture
    }

    fn last(updates: &Updates) -> (UpdateKind, Vec<u32>) {
        updates.borrow().last().cloned().unwrap()
    }

    #[test]
    fn state_refresh_yields_between_windows() {
        let windows = (1..=50).map(|id| WindowScript::new(id, "w")).collect();
        let (watcher, platform, scheduler) = watcher(vec![AppScript::new("a", windows)]);
        let (_sub, updates) = record(&watcher, 1);
        scheduler.advance(CHUNK);
        assert!(platform.actions().is_empty());

        // The state tick itself handles only the first window.
        assert!(scheduler.run_next());
        assert_eq!(platform.actions().len(), 1);
        assert!(kinds(&updates, UpdateKind::StatesRefreshed).is_empty());

        scheduler.advance(CHUNK * 49);
        assert_eq!(platform.actions().len(), 50);
        let refreshed = kinds(&updates, UpdateKind::StatesRefreshed);
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0], (1..=50).collect::<Vec<u32>>());
    }

    #[test]
    fn state_ticks_during_a_pass_report_the_previous_complete_list() {
        let (watcher, platform, scheduler) = slow_watcher(Duration::from_secs(1));
        let (_sub, updates) = record(&watcher, 1);

        // Pass one publishes at 1.6s; a refresh of it completes at 2.8s.
        scheduler.advance(Duration::from_secs(3));
        assert_eq!(last(&updates), (UpdateKind::StatesRefreshed, vec![1, 2, 3]));

        // Pass two runs from 3.6s to 5.2s. The refresh that starts at 3.8s
        // completes at 4.6s, inside it.
        platform.add_window(3, WindowScript::new(4, "four"));
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(last(&updates), (UpdateKind::StatesRefreshed, vec![1, 2, 3]));
        assert_eq!(watcher.current_windows().len(), 3);

        scheduler.advance(Duration::from_millis(300));
        assert_eq!(last(&updates), (UpdateKind::WindowsChanged, vec![1, 2, 3, 4]));
        assert_eq!(watcher.current_windows().len(), 4);
    }

    #[test]
    fn refresh_overtaken_by_a_pass_is_dropped() {
        let (watcher, platform, scheduler) = slow_watcher(Duration::from_millis(1300));
        let (_sub, updates) = record(&watcher, 1);
        scheduler.advance(Duration::from_millis(3500));
        assert_eq!(last(&updates), (UpdateKind::StatesRefreshed, vec![1, 2, 3]));
        platform.add_window(3, WindowScript::new(4, "four"));
        let seen = updates.borrow().len();

        // The refresh starting at 4.7s still has a window to go when pass two
        // publishes at 5.2s.
        scheduler.advance(Duration::from_secs(3));
        assert_eq!(updates.borrow()[seen..].to_vec(), vec![(
            UpdateKind::WindowsChanged,
            vec![1, 2, 3, 4]
        )]);
        assert_eq!(watcher.current_windows().len(), 4);

        // The loop carries on from the new list.
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(last(&updates), (UpdateKind::StatesRefreshed, vec![1, 2, 3, 4]));
    }
}
