//! Behavioral session tracking.
//!
//! # Design
//! A `SessionTracker` counts pointer-move and key-down events for the
//! lifetime of one client. It never touches a global: events arrive through
//! an injected `EventSource`, the automation check reads an injected
//! `Environment`, and timestamps come from a `Clock`.
//!
//! The lifecycle is explicit. `SessionTracker::new` has no side effects;
//! `start` subscribes the two counters and captures `loaded_at`; `stop`
//! unsubscribes them. A stopped tracker keeps its totals but never starts
//! again.
//!
//! Counters are atomics shared with the listener closures, so a snapshot
//! taken for one submission is a plain copy and later events never leak
//! into it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Interaction events the tracker listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    MouseMove,
    KeyDown,
}

/// Callback invoked once per observed event.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by `EventSource::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A source of ambient user-interaction events.
pub trait EventSource: Send + Sync {
    fn subscribe(&self, event: InputEvent, listener: Listener) -> SubscriptionId;

    /// Remove a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// An `EventSource` driven by explicit `emit` calls.
///
/// Used wherever the host pushes events in (tests, the FFI layer).
#[derive(Default)]
pub struct ManualEventSource {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, InputEvent, Listener)>>,
}

impl ManualEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one event to every listener subscribed to its kind.
    pub fn emit(&self, event: InputEvent) {
        // Listeners run outside the lock so they may subscribe/unsubscribe.
        let targets: Vec<Listener> = self
            .lock()
            .iter()
            .filter(|(_, kind, _)| *kind == event)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in targets {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, InputEvent, Listener)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for ManualEventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualEventSource")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventSource for ManualEventSource {
    fn subscribe(&self, event: InputEvent, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, event, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().retain(|(sub, _, _)| *sub != id);
    }
}

// ---------------------------------------------------------------------------
// Environment introspection
// ---------------------------------------------------------------------------

/// Global markers left behind by headless automation tools.
pub const HEADLESS_MARKERS: [&str; 2] = ["callPhantom", "_phantom"];

/// Read-only view of the host environment used for automation detection.
pub trait Environment {
    /// The navigator-exposed `webdriver` flag.
    fn navigator_webdriver(&self) -> bool;

    /// Value of an attribute on the document root element, if present.
    fn root_attribute(&self, name: &str) -> Option<String>;

    /// Whether a global with this name is defined.
    fn has_global(&self, name: &str) -> bool;
}

/// Returns true if any webdriver or headless marker is present.
pub fn detect_automation(env: &dyn Environment) -> bool {
    env.navigator_webdriver()
        || env.root_attribute("webdriver").is_some()
        || HEADLESS_MARKERS.iter().any(|marker| env.has_global(marker))
}

/// Plain-data `Environment`, filled in by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnvironmentSnapshot {
    pub navigator_webdriver: bool,
    pub root_attributes: BTreeMap<String, String>,
    pub globals: BTreeSet<String>,
}

impl EnvironmentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_navigator_webdriver(mut self, flag: bool) -> Self {
        self.navigator_webdriver = flag;
        self
    }

    pub fn with_root_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.root_attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_global(mut self, name: impl Into<String>) -> Self {
        self.globals.insert(name.into());
        self
    }
}

impl Environment for EnvironmentSnapshot {
    fn navigator_webdriver(&self) -> bool {
        self.navigator_webdriver
    }

    fn root_attribute(&self, name: &str) -> Option<String> {
        self.root_attributes.get(name).cloned()
    }

    fn has_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Millisecond wall clock.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Point-in-time copy of the session telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub loaded_at: i64,
    pub mousemove: u64,
    pub keydown: u64,
    pub webdriver: bool,
}

impl Session {
    /// Attach the submission timestamp.
    pub fn stamp(self, submitted_at: i64) -> SessionStamp {
        SessionStamp {
            loaded_at: self.loaded_at,
            mousemove: self.mousemove,
            keydown: self.keydown,
            webdriver: self.webdriver,
            submitted_at,
        }
    }
}

/// A `Session` as sent with one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStamp {
    pub loaded_at: i64,
    pub mousemove: u64,
    pub keydown: u64,
    pub webdriver: bool,
    pub submitted_at: i64,
}

#[derive(Debug, Default)]
struct Counters {
    mousemove: AtomicU64,
    keydown: AtomicU64,
}

struct Subscriptions {
    source: Arc<dyn EventSource>,
    ids: [SubscriptionId; 2],
}

enum Phase {
    Idle,
    Tracking(Subscriptions),
    Stopped,
}

/// Accumulates interaction signals for one client instance.
pub struct SessionTracker {
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
    loaded_at: i64,
    webdriver: bool,
    phase: Phase,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTracker")
            .field("session", &self.snapshot())
            .field("tracking", &self.is_tracking())
            .finish()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            counters: Arc::new(Counters::default()),
            loaded_at: 0,
            webdriver: false,
            phase: Phase::Idle,
        }
    }

    /// Capture `loaded_at`, run automation detection and subscribe both
    /// counters. Only the first call on a fresh tracker has an effect.
    pub fn start(&mut self, source: Arc<dyn EventSource>, env: &dyn Environment) -> bool {
        if !matches!(self.phase, Phase::Idle) {
            return false;
        }

        self.loaded_at = self.clock.now_millis();
        self.webdriver = detect_automation(env);

        let counters = Arc::clone(&self.counters);
        let on_mousemove: Listener = Arc::new(move || {
            counters.mousemove.fetch_add(1, Ordering::Relaxed);
        });
        let counters = Arc::clone(&self.counters);
        let on_keydown: Listener = Arc::new(move || {
            counters.keydown.fetch_add(1, Ordering::Relaxed);
        });

        let ids = [
            source.subscribe(InputEvent::MouseMove, on_mousemove),
            source.subscribe(InputEvent::KeyDown, on_keydown),
        ];
        debug!(
            loaded_at = self.loaded_at,
            webdriver = self.webdriver,
            "session tracking started"
        );
        self.phase = Phase::Tracking(Subscriptions { source, ids });
        true
    }

    /// Detach both listeners. Totals stay readable; repeat calls do nothing.
    /// A tracker stopped before it was started can no longer start.
    pub fn stop(&mut self) {
        if let Phase::Tracking(subs) = std::mem::replace(&mut self.phase, Phase::Stopped) {
            for id in subs.ids {
                subs.source.unsubscribe(id);
            }
            debug!(session = ?self.snapshot(), "session tracking stopped");
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.phase, Phase::Tracking(_))
    }

    pub fn snapshot(&self) -> Session {
        Session {
            loaded_at: self.loaded_at,
            mousemove: self.counters.mousemove.load(Ordering::Relaxed),
            keydown: self.counters.keydown.load(Ordering::Relaxed),
            webdriver: self.webdriver,
        }
    }

    /// Snapshot the session and stamp it with the current time.
    pub fn stamp(&self) -> SessionStamp {
        self.snapshot().stamp(self.clock.now_millis())
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
