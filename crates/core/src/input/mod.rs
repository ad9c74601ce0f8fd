use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{config::InputConfig, pool::NoteKind};

/// Semantic input classes after device mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputClass {
    Left,
    Right,
    /// The timing input that closes a pattern.
    Sync,
}

impl InputClass {
    pub const ALL: [InputClass; 3] = [InputClass::Left, InputClass::Right, InputClass::Sync];

    /// Note direction addressed by this class, `None` for [`InputClass::Sync`].
    pub fn direction(self) -> Option<NoteKind> {
        match self {
            InputClass::Left => Some(NoteKind::Left),
            InputClass::Right => Some(NoteKind::Right),
            InputClass::Sync => None,
        }
    }

    fn slot(self) -> usize {
        match self {
            InputClass::Left => 0,
            InputClass::Right => 1,
            InputClass::Sync => 2,
        }
    }
}

impl From<NoteKind> for InputClass {
    fn from(kind: NoteKind) -> Self {
        match kind {
            NoteKind::Left => InputClass::Left,
            NoteKind::Right => InputClass::Right,
        }
    }
}

/// Debounced input, timestamped on the song clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub class: InputClass,
    pub timestamp_ms: f64,
}

/// Subscription token returned by [`InputRouter::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    class: InputClass,
}

impl ListenerHandle {
    pub fn class(&self) -> InputClass {
        self.class
    }
}

type Listener = Box<dyn FnMut(&InputEvent)>;

/// Debounces inputs per class and fans them out to listeners in
/// registration order. Holds no game state.
pub struct InputRouter {
    listeners: [Vec<(ListenerHandle, Listener)>; 3],
    last_accepted: [Option<f64>; 3],
    debounce_ms: f64,
    enabled: bool,
    next_handle: u64,
}

impl InputRouter {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            listeners: [Vec::new(), Vec::new(), Vec::new()],
            last_accepted: [None; 3],
            debounce_ms: config.debounce_ms.max(0.0),
            enabled: true,
            next_handle: 0,
        }
    }

    pub fn register<F>(&mut self, class: InputClass, callback: F) -> ListenerHandle
    where
        F: FnMut(&InputEvent) + 'static,
    {
        let handle = ListenerHandle {
            id: self.next_handle,
            class,
        };
        self.next_handle += 1;
        self.listeners[class.slot()].push((handle, Box::new(callback)));
        handle
    }

    /// Removes a listener. Unknown handles are logged and ignored, so calling
    /// this twice with the same handle is harmless.
    pub fn unregister(&mut self, handle: ListenerHandle) -> bool {
        let listeners = &mut self.listeners[handle.class.slot()];
        match listeners.iter().position(|(existing, _)| *existing == handle) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => {
                tracing::warn!(?handle, "unregistering a listener that is not registered");
                false
            }
        }
    }

    /// Entry point for device input. Returns whether listeners were invoked.
    pub fn handle(&mut self, class: InputClass, time_ms: f64) -> bool {
        if !self.enabled {
            tracing::debug!(?class, time_ms, "input disabled, dropping event");
            return false;
        }

        if let Some(last) = self.last_accepted[class.slot()] {
            if time_ms - last < self.debounce_ms {
                tracing::debug!(?class, time_ms, last, "debounced input");
                return false;
            }
        }

        self.dispatch(class, time_ms);
        true
    }

    /// Dispatch path for automated play. The event always fires but still
    /// moves the debounce reference for later device input.
    pub fn simulate(&mut self, class: InputClass, time_ms: f64) {
        self.dispatch(class, time_ms);
    }

    pub fn listener_count(&self, class: InputClass) -> usize {
        self.listeners[class.slot()].len()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        tracing::debug!(enabled, "input routing toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn debounce_ms(&self) -> f64 {
        self.debounce_ms
    }

    pub fn set_debounce_ms(&mut self, debounce_ms: f64) {
        self.debounce_ms = debounce_ms.max(0.0);
    }

    /// Forgets debounce history, for example after a restart rewinds the clock.
    pub fn reset_debounce(&mut self) {
        self.last_accepted = [None; 3];
    }

    fn dispatch(&mut self, class: InputClass, time_ms: f64) {
        self.last_accepted[class.slot()] = Some(time_ms);
        let event = InputEvent {
            class,
            timestamp_ms: time_ms,
        };

        for (_, listener) in self.listeners[class.slot()].iter_mut() {
            listener(&event);
        }
    }
}

impl fmt::Debug for InputRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRouter")
            .field("listeners", &self.listeners.iter().map(Vec::len).collect::<Vec<_>>())
            .field("last_accepted", &self.last_accepted)
            .field("debounce_ms", &self.debounce_ms)
            .field("enabled", &self.enabled)
            .finish()
    }
}
