//! # Blocker
//!
//! Synchronous interception of inspector shortcuts and the context menu.
//!
//! ## Blocked Key Table
//!
//! | Combination | Opens |
//! |-------------|-------|
//! | `F12` | Developer tools |
//! | Mod+Shift+`I` | Inspector |
//! | Mod+Shift+`J` | Console |
//! | Mod+Shift+`C` | Element picker |
//! | Mod+`U` | View source |
//!
//! `Mod` is the platform modifier: Control, or Command (Meta) on Apple
//! platforms. Letters match case-insensitively. Every other key passes through
//! untouched.

use crate::config::BlockerConfig;
use crate::detector::DetectionEvent;
use crate::host::{ContextMenuEvent, KeyEvent};

const SHIFTED_LETTERS: [&str; 3] = ["I", "J", "C"];

/// Returns true if `event` is one of the blocked inspector shortcuts.
#[must_use]
pub fn is_blocked_combo(event: &KeyEvent) -> bool {
    if event.key == "F12" {
        return true;
    }
    let modifier = event.ctrl || event.meta;
    if !modifier {
        return false;
    }
    let key = event.key.as_str();
    if event.shift && SHIFTED_LETTERS.iter().any(|l| key.eq_ignore_ascii_case(l)) {
        return true;
    }
    key.eq_ignore_ascii_case("u")
}

/// Input interceptor for one activation.
#[derive(Debug, Clone, Default)]
pub struct Blocker {
    context_menu_is_violation: bool,
}

impl Blocker {
    /// Creates a blocker from its configuration.
    #[must_use]
    pub const fn new(config: &BlockerConfig) -> Self {
        Self {
            context_menu_is_violation: config.context_menu_is_violation,
        }
    }

    /// Handles a keydown. Matched shortcuts are suppressed and reported once.
    pub fn on_key(&self, event: &mut KeyEvent) -> Option<DetectionEvent> {
        if !is_blocked_combo(event) {
            return None;
        }
        event.prevent_default();
        Some(DetectionEvent::BlockedKeyCombo)
    }

    /// Handles a context-menu request. Always suppressed.
    pub fn on_context_menu(&self, event: &mut ContextMenuEvent) -> Option<DetectionEvent> {
        event.prevent_default();
        event.stop_propagation();
        self.context_menu_is_violation
            .then_some(DetectionEvent::ContextMenuAttempt)
    }
}
