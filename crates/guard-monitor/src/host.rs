//! # Host Environment Adapter
//!
//! Everything the monitor needs from its runtime, behind one trait.
//!
//! ## Capabilities
//!
//! | Capability | Methods |
//! |------------|---------|
//! | Viewport extents | [`Host::viewport`] |
//! | Global signals | [`Host::subscribe`], [`Host::unsubscribe`] |
//! | Timers | [`Host::set_interval`], [`Host::set_timeout`], [`Host::clear_timer`] |
//! | Session store | [`Host::session_get`], [`Host::session_set`] |
//! | Render target | [`Host::replace_content`], [`Host::disable_scroll`] |
//! | Navigation | [`Host::navigate`] |
//! | Diagnostic output | [`Host::log_diagnostic`], [`Host::clear_diagnostics`] |
//! | Outbound delivery | [`Host::send_beacon`] |
//!
//! ## Execution Model
//!
//! The host owns a single-threaded cooperative event loop. Handlers and
//! timer callbacks run to completion one at a time and are never preempted,
//! which is why callbacks are `Rc<dyn Fn>` rather than `Arc<dyn Fn + Send>`.
//! Implementations must not hold internal borrows while invoking a callback,
//! since callbacks re-enter the host.

use std::rc::Rc;
use std::time::Duration;

use crate::detector::ConsoleProbe;

/// Outer (window frame) and inner (usable viewport) extents in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Window frame width.
    pub outer_width: i32,
    /// Window frame height.
    pub outer_height: i32,
    /// Usable viewport width.
    pub inner_width: i32,
    /// Usable viewport height.
    pub inner_height: i32,
}

impl Viewport {
    /// Creates a viewport from outer and inner extents.
    #[must_use]
    pub const fn new(outer_width: i32, outer_height: i32, inner_width: i32, inner_height: i32) -> Self {
        Self {
            outer_width,
            outer_height,
            inner_width,
            inner_height,
        }
    }

    /// Horizontal frame overhead.
    #[inline]
    #[must_use]
    pub const fn width_gap(&self) -> i32 {
        self.outer_width - self.inner_width
    }

    /// Vertical frame overhead.
    #[inline]
    #[must_use]
    pub const fn height_gap(&self) -> i32 {
        self.outer_height - self.inner_height
    }
}

/// Class of global signal a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// `keydown`
    KeyDown,
    /// `contextmenu`
    ContextMenu,
    /// Window resize / dimension change.
    Resize,
}

/// A keyboard event as delivered to capture-phase handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    /// Logical key value (`"F12"`, `"i"`, `"I"`, ...).
    pub key: String,
    /// Control modifier held.
    pub ctrl: bool,
    /// Shift modifier held.
    pub shift: bool,
    /// Alt/Option modifier held.
    pub alt: bool,
    /// Meta/Command modifier held.
    pub meta: bool,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl KeyEvent {
    /// Creates an unmodified keydown for `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Sets the Control modifier.
    #[must_use]
    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    /// Sets the Shift modifier.
    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Sets the Alt modifier.
    #[must_use]
    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    /// Sets the Meta modifier.
    #[must_use]
    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Suppresses the runtime's default handling.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Stops the event from reaching later handlers.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether default handling was suppressed.
    #[must_use]
    pub const fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Whether propagation was stopped.
    #[must_use]
    pub const fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// A context-menu request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextMenuEvent {
    default_prevented: bool,
    propagation_stopped: bool,
}

impl ContextMenuEvent {
    /// Creates a fresh context-menu request.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Suppresses the native menu.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Stops the event from reaching later handlers.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether the native menu was suppressed.
    #[must_use]
    pub const fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Whether propagation was stopped.
    #[must_use]
    pub const fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// A global signal delivered to subscribed handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Keyboard press.
    KeyDown(KeyEvent),
    /// Context-menu request.
    ContextMenu(ContextMenuEvent),
    /// Viewport dimensions changed.
    Resize,
}

impl HostEvent {
    /// The subscription class this event is routed to.
    #[must_use]
    pub const fn kind(&self) -> SignalKind {
        match self {
            Self::KeyDown(_) => SignalKind::KeyDown,
            Self::ContextMenu(_) => SignalKind::ContextMenu,
            Self::Resize => SignalKind::Resize,
        }
    }
}

/// Handler for a global signal. May mutate the event to suppress it.
pub type EventHandler = Rc<dyn Fn(&mut HostEvent)>;

/// Timer callback.
pub type TimerCallback = Rc<dyn Fn()>;

/// Handle of a signal subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Runtime capabilities consumed by the monitor.
///
/// All methods take `&self`: the host owns whatever interior state the
/// runtime has. None of them may panic or fail into the caller.
pub trait Host {
    /// Current outer and inner viewport extents.
    fn viewport(&self) -> Viewport;

    /// Registers a capture-phase handler for a signal class.
    fn subscribe(&self, kind: SignalKind, handler: EventHandler) -> SubscriptionId;

    /// Removes a handler. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Schedules `callback` every `period`.
    fn set_interval(&self, period: Duration, callback: TimerCallback) -> TimerId;

    /// Schedules `callback` once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Cancels a timer. Unknown ids are ignored.
    fn clear_timer(&self, id: TimerId);

    /// Reads a session-scoped entry.
    fn session_get(&self, key: &str) -> Option<String>;

    /// Writes a session-scoped entry.
    fn session_set(&self, key: &str, value: &str);

    /// Replaces all rendered content with `markup`.
    fn replace_content(&self, markup: &str);

    /// Disables scrolling of the render target.
    fn disable_scroll(&self);

    /// Navigates the page to `location`.
    fn navigate(&self, location: &str);

    /// Writes a value to diagnostic output (the developer console).
    fn log_diagnostic(&self, probe: &ConsoleProbe);

    /// Clears diagnostic output.
    fn clear_diagnostics(&self);

    /// Queues a best-effort, unload-surviving POST. Returns whether the
    /// runtime accepted it for delivery.
    fn send_beacon(&self, url: &str, body: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_gaps() {
        let viewport = Viewport::new(1000, 800, 840, 700);
        assert_eq!(viewport.width_gap(), 160);
        assert_eq!(viewport.height_gap(), 100);
    }

    #[test]
    fn test_key_event_flags() {
        let mut event = KeyEvent::new("I").with_ctrl().with_shift();
        assert!(event.ctrl && event.shift && !event.alt && !event.meta);
        assert!(!event.is_default_prevented());

        event.prevent_default();
        assert!(event.is_default_prevented());
        assert!(!event.is_propagation_stopped());
    }

    #[test]
    fn test_event_kind_routing() {
        assert_eq!(HostEvent::KeyDown(KeyEvent::new("a")).kind(), SignalKind::KeyDown);
        assert_eq!(
            HostEvent::ContextMenu(ContextMenuEvent::new()).kind(),
            SignalKind::ContextMenu
        );
        assert_eq!(HostEvent::Resize.kind(), SignalKind::Resize);
    }
}
