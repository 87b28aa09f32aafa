//! # Simulated Host
//!
//! A deterministic [`Host`] with a virtual clock, used by the test suites and
//! by the `inspect-guard simulate` command.
//!
//! ## Model
//!
//! - Time only moves through [`SimulatedHost::advance`]; timers fire in due
//!   order, ties broken by creation order
//! - Signals are delivered synchronously to every handler of their class
//! - Navigating tears the page down: subscriptions, timers and content are
//!   dropped, the session store survives
//! - [`reload`](SimulatedHost::reload) reopens the application in the same
//!   session; [`end_session`](SimulatedHost::end_session) clears the store
//!
//! No internal borrow is held while a handler or timer callback runs, so
//! callbacks may freely re-enter the host.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::detector::ConsoleProbe;
use crate::host::{
    ContextMenuEvent, EventHandler, Host, HostEvent, KeyEvent, SignalKind, SubscriptionId,
    TimerCallback, TimerId, Viewport,
};

/// Content rendered by the application before any lockdown.
pub const APP_CONTENT: &str = "<div id=\"root\">portal</div>";

/// Location of the application page.
pub const APP_LOCATION: &str = "https://portal.local/dashboard";

const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Timer {
    due: Duration,
    period: Option<Duration>,
    callback: TimerCallback,
}

struct SimState {
    now: Duration,
    next_id: u64,
    viewport: Viewport,
    subscriptions: BTreeMap<u64, (SignalKind, EventHandler)>,
    timers: BTreeMap<u64, Timer>,
    session: HashMap<String, String>,
    content: String,
    scroll_disabled: bool,
    location: String,
    navigations: Vec<String>,
    console_open: bool,
    diagnostics_logged: usize,
    beacon_accepts: bool,
    beacons: Vec<(String, String)>,
}

impl SimState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn teardown_page(&mut self) {
        self.subscriptions.clear();
        self.timers.clear();
        self.scroll_disabled = false;
    }
}

/// In-memory host with a virtual clock.
pub struct SimulatedHost {
    state: RefCell<SimState>,
}

impl SimulatedHost {
    /// A fresh session showing the application in an undocked 1280x800 window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(SimState {
                now: Duration::ZERO,
                next_id: 0,
                viewport: Viewport::new(1280, 800, 1280, 720),
                subscriptions: BTreeMap::new(),
                timers: BTreeMap::new(),
                session: HashMap::new(),
                content: APP_CONTENT.to_string(),
                scroll_disabled: false,
                location: APP_LOCATION.to_string(),
                navigations: Vec::new(),
                console_open: false,
                diagnostics_logged: 0,
                beacon_accepts: true,
                beacons: Vec::new(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Driving the simulation
    // ------------------------------------------------------------------

    /// Moves the virtual clock forward, firing every timer that comes due.
    pub fn advance(&self, by: Duration) {
        let target = self.state.borrow().now + by;
        loop {
            let callback = {
                let mut state = self.state.borrow_mut();
                let next = state
                    .timers
                    .iter()
                    .filter(|(_, t)| t.due <= target)
                    .map(|(id, t)| (t.due, *id))
                    .min();
                let Some((due, id)) = next else {
                    break;
                };
                state.now = due;
                let Some(timer) = state.timers.get_mut(&id) else {
                    break;
                };
                let callback = Rc::clone(&timer.callback);
                let period = timer.period;
                match period {
                    Some(period) => timer.due = due + period,
                    None => {
                        state.timers.remove(&id);
                    }
                }
                callback
            };
            callback();
        }
        self.state.borrow_mut().now = target;
    }

    /// Delivers `event` to every handler subscribed to its class.
    pub fn dispatch(&self, mut event: HostEvent) -> HostEvent {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .state
            .borrow()
            .subscriptions
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in handlers {
            handler(&mut event);
        }
        event
    }

    /// Presses a key and returns the event as the handlers left it.
    pub fn dispatch_keydown(&self, event: KeyEvent) -> KeyEvent {
        match self.dispatch(HostEvent::KeyDown(event)) {
            HostEvent::KeyDown(event) => event,
            _ => unreachable!("dispatch preserves the event variant"),
        }
    }

    /// Requests the context menu and returns the event as the handlers left it.
    pub fn dispatch_context_menu(&self) -> ContextMenuEvent {
        match self.dispatch(HostEvent::ContextMenu(ContextMenuEvent::new())) {
            HostEvent::ContextMenu(event) => event,
            _ => unreachable!("dispatch preserves the event variant"),
        }
    }

    /// Changes the window geometry and fires a resize signal.
    pub fn resize_to(&self, viewport: Viewport) {
        self.set_viewport(viewport);
        self.dispatch(HostEvent::Resize);
    }

    /// Changes the window geometry silently (only polling will notice).
    pub fn set_viewport(&self, viewport: Viewport) {
        self.state.borrow_mut().viewport = viewport;
    }

    /// Opens or closes the simulated developer console.
    pub fn set_console_open(&self, open: bool) {
        self.state.borrow_mut().console_open = open;
    }

    /// Makes the beacon primitive accept or refuse deliveries.
    pub fn set_beacon_accepts(&self, accepts: bool) {
        self.state.borrow_mut().beacon_accepts = accepts;
    }

    /// Writes a session entry directly, as an earlier page would have.
    pub fn seed_session(&self, key: &str, value: &str) {
        self.state
            .borrow_mut()
            .session
            .insert(key.to_string(), value.to_string());
    }

    /// Reopens the application in the same session.
    pub fn reload(&self) {
        let mut state = self.state.borrow_mut();
        state.teardown_page();
        state.content = APP_CONTENT.to_string();
        state.location = APP_LOCATION.to_string();
    }

    /// Ends the browsing session, clearing the session store.
    pub fn end_session(&self) {
        self.state.borrow_mut().session.clear();
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Currently rendered content.
    #[must_use]
    pub fn content(&self) -> String {
        self.state.borrow().content.clone()
    }

    /// Whether scrolling is disabled.
    #[must_use]
    pub fn scroll_disabled(&self) -> bool {
        self.state.borrow().scroll_disabled
    }

    /// Current location.
    #[must_use]
    pub fn location(&self) -> String {
        self.state.borrow().location.clone()
    }

    /// Every navigation performed, in order.
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    /// Number of live timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Reads a session entry.
    #[must_use]
    pub fn session_value(&self, key: &str) -> Option<String> {
        self.state.borrow().session.get(key).cloned()
    }

    /// Number of diagnostic-output writes.
    #[must_use]
    pub fn diagnostics_logged(&self) -> usize {
        self.state.borrow().diagnostics_logged
    }

    /// Accepted beacons as `(url, body)`.
    #[must_use]
    pub fn beacons(&self) -> Vec<(String, String)> {
        self.state.borrow().beacons.clone()
    }

    fn schedule(&self, delay: Duration, period: Option<Duration>, callback: TimerCallback) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        let due = state.now + delay;
        state.timers.insert(
            id,
            Timer {
                due,
                period,
                callback,
            },
        );
        TimerId(id)
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SimulatedHost {
    fn viewport(&self) -> Viewport {
        self.state.borrow().viewport
    }

    fn subscribe(&self, kind: SignalKind, handler: EventHandler) -> SubscriptionId {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.subscriptions.insert(id, (kind, handler));
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.state.borrow_mut().subscriptions.remove(&id.0);
    }

    fn set_interval(&self, period: Duration, callback: TimerCallback) -> TimerId {
        let period = period.max(MIN_PERIOD);
        self.schedule(period, Some(period), callback)
    }

    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        self.schedule(delay, None, callback)
    }

    fn clear_timer(&self, id: TimerId) {
        self.state.borrow_mut().timers.remove(&id.0);
    }

    fn session_get(&self, key: &str) -> Option<String> {
        self.session_value(key)
    }

    fn session_set(&self, key: &str, value: &str) {
        self.seed_session(key, value);
    }

    fn replace_content(&self, markup: &str) {
        self.state.borrow_mut().content = markup.to_string();
    }

    fn disable_scroll(&self) {
        self.state.borrow_mut().scroll_disabled = true;
    }

    fn navigate(&self, location: &str) {
        let mut state = self.state.borrow_mut();
        state.teardown_page();
        state.content.clear();
        state.location = location.to_string();
        state.navigations.push(location.to_string());
    }

    fn log_diagnostic(&self, probe: &ConsoleProbe) {
        let open = {
            let mut state = self.state.borrow_mut();
            state.diagnostics_logged += 1;
            state.console_open
        };
        if open {
            // An open console renders the object, evaluating its accessors.
            let _ = probe.id();
        }
    }

    fn clear_diagnostics(&self) {}

    fn send_beacon(&self, url: &str, body: &str) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.beacon_accepts {
            return false;
        }
        state.beacons.push((url.to_string(), body.to_string()));
        true
    }
}

impl fmt::Debug for SimulatedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SimulatedHost")
            .field("now", &state.now)
            .field("viewport", &state.viewport)
            .field("location", &state.location)
            .field("subscriptions", &state.subscriptions.len())
            .field("timers", &state.timers.len())
            .finish_non_exhaustive()
    }
}
