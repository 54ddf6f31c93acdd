//! Chunked window enumeration.
//!
//! A pass visits one application per scheduled step so that no single
//! callback on the host event loop does more than one application's worth of
//! window queries. The pass is a small state machine:
//!
//! ```text
//! Idle --start--> Scanning { next: 0 } --step--> ... --step--> Idle (report)
//! ```
//!
//! The display lock is checked at the start of the pass and after every step.
//! Seeing it locked at any checkpoint makes the whole result invalid.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, instrument, trace, warn};

use crate::common::collections::HashSet;
use crate::common::config::{ConfigError, FilterSettings};
use crate::model::window::{EnumerationResult, Window};
use crate::sys::platform::{ApplicationHandle, PlatformProvider};
use crate::sys::scheduler::{Scheduler, TimerId};

/// Decides which enumerated windows belong on the taskbar.
#[derive(Debug, Clone, Default)]
pub struct WindowFilter {
    host_bundle_id: Option<String>,
    console_window_title: Option<String>,
    pseudo_window_bundle_ids: HashSet<String>,
    title_patterns: Vec<Regex>,
}

impl WindowFilter {
    pub fn from_settings(
        settings: &FilterSettings,
        host_bundle_id: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            host_bundle_id,
            console_window_title: settings.console_window_title.clone(),
            pseudo_window_bundle_ids: settings.pseudo_window_bundle_ids.iter().cloned().collect(),
            title_patterns: settings.title_patterns()?,
        })
    }

    pub fn admits(&self, window: &Window) -> bool {
        if let Some(host) = &self.host_bundle_id
            && window.bundle_id == *host
        {
            // Our own overlays never get a button; the console does.
            return self.console_window_title.as_deref() == Some(window.title.as_str());
        }

        if self.pseudo_window_bundle_ids.contains(&window.bundle_id) {
            let subrole = window.handle.subrole();
            if subrole.as_deref().is_none_or(str::is_empty) {
                return false;
            }
        }

        !self.title_patterns.iter().any(|re| re.is_match(&window.title))
    }
}

pub type Completion = Box<dyn FnOnce(EnumerationResult)>;

/// Runs enumeration passes. Cloning yields another handle to the same
/// enumerator.
#[derive(Clone)]
pub struct Enumerator(Rc<Inner>);

struct Inner {
    platform: Rc<dyn PlatformProvider>,
    scheduler: Rc<dyn Scheduler>,
    filter: RefCell<WindowFilter>,
    chunk_interval: Cell<Duration>,
    next_pass: Cell<u64>,
    phase: RefCell<Phase>,
}

enum Phase {
    Idle,
    Scanning(Scan),
}

struct Scan {
    pass: u64,
    apps: Vec<Rc<dyn ApplicationHandle>>,
    next: usize,
    windows: Vec<Window>,
    lock_seen: bool,
    timer: Option<TimerId>,
    on_done: Completion,
}

impl Enumerator {
    pub fn new(
        platform: Rc<dyn PlatformProvider>,
        scheduler: Rc<dyn Scheduler>,
        filter: WindowFilter,
        chunk_interval: Duration,
    ) -> Self {
        Enumerator(Rc::new(Inner {
            platform,
            scheduler,
            filter: RefCell::new(filter),
            chunk_interval: Cell::new(chunk_interval),
            next_pass: Cell::new(0),
            phase: RefCell::new(Phase::Idle),
        }))
    }

    pub fn is_scanning(&self) -> bool { matches!(*self.0.phase.borrow(), Phase::Scanning(_)) }

    pub fn set_filter(&self, filter: WindowFilter) { *self.0.filter.borrow_mut() = filter; }

    pub fn set_chunk_interval(&self, interval: Duration) { self.0.chunk_interval.set(interval); }

    /// Starts a pass that reports to `on_done` exactly once.
    ///
    /// Returns false, dropping `on_done`, if a pass is already in flight;
    /// that pass will report as usual.
    #[instrument(name = "enumerator::start", skip_all)]
    pub fn start(&self, on_done: Completion) -> bool {
        if self.is_scanning() {
            trace!("enumeration already in flight, coalescing");
            return false;
        }

        let locked = self.0.platform.is_display_locked();
        let apps = match self.0.platform.running_applications() {
            Ok(apps) => apps,
            Err(err) => {
                warn!(%err, "failed to list running applications");
                on_done(EnumerationResult { windows: Vec::new(), is_valid: false });
                return true;
            }
        };

        if apps.is_empty() {
            debug!(locked, "no running applications");
            on_done(EnumerationResult { windows: Vec::new(), is_valid: !locked });
            return true;
        }

        let pass = self.0.next_pass.get();
        self.0.next_pass.set(pass + 1);
        debug!(pass, apps = apps.len(), locked, "starting enumeration pass");
        *self.0.phase.borrow_mut() = Phase::Scanning(Scan {
            pass,
            apps,
            next: 0,
            windows: Vec::new(),
            lock_seen: locked,
            timer: None,
            on_done,
        });
        self.schedule_step(pass);
        true
    }

    /// Abandons the pass in flight, if any. Its completion is dropped
    /// without being called and its pending step is cancelled.
    pub fn cancel(&self) {
        let phase = std::mem::replace(&mut *self.0.phase.borrow_mut(), Phase::Idle);
        if let Phase::Scanning(scan) = phase {
            debug!(pass = scan.pass, next = scan.next, "abandoning enumeration pass");
            if let Some(timer) = scan.timer {
                self.0.scheduler.cancel(timer);
            }
        }
    }

    fn schedule_step(&self, pass: u64) {
        let weak = Rc::downgrade(&self.0);
        let timer = self.0.scheduler.schedule(
            self.0.chunk_interval.get(),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Enumerator(inner).step(pass);
                }
            }),
        );
        if let Phase::Scanning(scan) = &mut *self.0.phase.borrow_mut()
            && scan.pass == pass
        {
            scan.timer = Some(timer);
        }
    }

    fn step(&self, pass: u64) {
        let (app, index) = match &*self.0.phase.borrow() {
            Phase::Scanning(scan) if scan.pass == pass => (scan.apps[scan.next].clone(), scan.next),
            _ => {
                trace!(pass, "dropping step of an abandoned pass");
                return;
            }
        };

        // Host calls happen without the phase borrowed.
        let windows = self.collect(app.as_ref());
        let locked = self.0.platform.is_display_locked();
        trace!(pass, index, found = windows.len(), locked, "enumerated application");

        let finished = {
            let mut phase = self.0.phase.borrow_mut();
            let Phase::Scanning(scan) = &mut *phase else { return };
            if scan.pass != pass {
                return;
            }
            scan.windows.extend(windows);
            scan.lock_seen |= locked;
            scan.next += 1;
            scan.timer = None;
            scan.next >= scan.apps.len()
        };

        if finished {
            self.finish();
        } else {
            self.schedule_step(pass);
        }
    }

    fn collect(&self, app: &dyn ApplicationHandle) -> Vec<Window> {
        let bundle_id = app.bundle_id();
        let handles = match app.windows() {
            Ok(handles) => handles,
            Err(err) => {
                debug!(?bundle_id, %err, "skipping application this pass");
                return Vec::new();
            }
        };

        let filter = self.0.filter.borrow();
        handles
            .into_iter()
            .filter_map(|handle| match Window::read(handle, bundle_id.as_deref()) {
                Ok(window) if filter.admits(&window) => Some(window),
                Ok(window) => {
                    trace!(window_id = %window.id, title = %window.title, "excluded window");
                    None
                }
                Err(err) => {
                    debug!(?bundle_id, %err, "skipping window this pass");
                    None
                }
            })
            .collect()
    }

    fn finish(&self) {
        let phase = std::mem::replace(&mut *self.0.phase.borrow_mut(), Phase::Idle);
        let Phase::Scanning(scan) = phase else { return };
        let result = EnumerationResult {
            is_valid: !scan.lock_seen,
            windows: scan.windows,
        };
        debug!(
            pass = scan.pass,
            windows = result.windows.len(),
            valid = result.is_valid,
            "enumeration pass finished"
        );
        (scan.on_done)(result);
    }
}
