//! Line input events, including keystrokes observed while a line is edited.

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use rustyline::{
    Cmd, ConditionalEventHandler, Event, EventContext, KeyCode, KeyEvent, Modifiers, RepeatCount,
};
use tokio::sync::mpsc;

/// Minimum gap between two keystroke events
pub const KEYSTROKE_THROTTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A submitted, non-empty line
    Line(String),
    /// The user is typing a chat message
    Keystroke,
}

/// Whether `key`, pressed while the line reads `line`, edits a chat message.
///
/// Control chords and anything typed into a `/command` do not count.
pub fn is_message_keystroke(key: &KeyEvent, line: &str) -> bool {
    let KeyEvent(KeyCode::Char(c), modifiers) = key else {
        return false;
    };
    if modifiers.contains(Modifiers::CTRL) || modifiers.contains(Modifiers::ALT) {
        return false;
    }
    !(line.starts_with('/') || (line.is_empty() && *c == '/'))
}

/// Lets at most one event through per interval
#[derive(Debug)]
pub struct KeystrokeThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl KeystrokeThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Whether an event may go out at `now`; if so, `now` starts a new interval
    pub fn try_acquire(&self, now: Instant) -> bool {
        let Ok(mut last) = self.last.lock() else {
            return false;
        };
        if last.is_some_and(|at| now.duration_since(at) < self.interval) {
            return false;
        }
        *last = Some(now);
        true
    }
}

/// rustyline hook that reports message keystrokes to the command loop
pub struct KeystrokeNotifier {
    events: mpsc::UnboundedSender<InputEvent>,
    throttle: KeystrokeThrottle,
}

impl KeystrokeNotifier {
    pub fn new(events: mpsc::UnboundedSender<InputEvent>) -> Self {
        Self {
            events,
            throttle: KeystrokeThrottle::new(KEYSTROKE_THROTTLE),
        }
    }
}

impl ConditionalEventHandler for KeystrokeNotifier {
    fn handle(&self, evt: &Event, _: RepeatCount, _: bool, ctx: &EventContext) -> Option<Cmd> {
        if let Some(key) = evt.get(0)
            && is_message_keystroke(key, ctx.line())
            && self.throttle.try_acquire(Instant::now())
        {
            let _ = self.events.send(InputEvent::Keystroke);
        }
        // The key itself is handled as usual
        None
    }
}
