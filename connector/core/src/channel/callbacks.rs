//! JSONP Callback Registry
//!
//! The script-inject channel needs a temporary, globally addressable,
//! exactly-once callback slot: the backend answers with a script of the form
//! `__gas_cb_getStats_1700000000000_42({...})`, and whoever "runs" that
//! script must find the waiting attempt by name.
//!
//! Slots are owned by a [`CallbackSlot`] guard. Dropping the guard unbinds
//! the name, so a slot never outlives its attempt no matter how the attempt
//! ends (callback fired, load error, timeout, or the caller giving up).

use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;
use tokio::sync::oneshot;

/// Prefix shared by all generated callback names
pub const CALLBACK_PREFIX: &str = "__gas_cb_";

static GLOBAL: OnceLock<Arc<CallbackRegistry>> = OnceLock::new();

/// Process-wide map of callback names to waiting attempts
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    slots: DashMap<String, oneshot::Sender<Value>>,
}

impl CallbackRegistry {
    /// Create an isolated registry
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The shared process-wide registry
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(Self::new))
    }

    /// Bind a fresh callback name for `action`
    ///
    /// Returns the guard owning the binding and the receiver that yields the
    /// callback argument.
    pub fn register(self: &Arc<Self>, action: &str) -> (CallbackSlot, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        let mut rng = rand::thread_rng();
        loop {
            let name = format!(
                "{CALLBACK_PREFIX}{action}_{}_{}",
                chrono::Utc::now().timestamp_millis(),
                rng.gen_range(0..10_000)
            );
            if let Entry::Vacant(vacant) = self.slots.entry(name.clone()) {
                vacant.insert(tx);
                let slot = CallbackSlot {
                    name,
                    registry: Arc::clone(self),
                };
                return (slot, rx);
            }
        }
    }

    /// Fire the callback bound to `name`
    ///
    /// The binding is consumed; a second invocation finds nothing. Returns
    /// whether a callback was bound.
    pub fn invoke(&self, name: &str, payload: Value) -> bool {
        match self.slots.remove(name) {
            Some((_, tx)) => {
                // Receiver gone means the attempt already settled; nothing to do
                let _ = tx.send(payload);
                true
            }
            None => false,
        }
    }

    /// Whether `name` is currently bound
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Number of live bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no bindings are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Guard owning one callback binding
#[derive(Debug)]
pub struct CallbackSlot {
    name: String,
    registry: Arc<CallbackRegistry>,
}

impl CallbackSlot {
    /// The generated callback name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CallbackSlot {
    fn drop(&mut self) {
        self.registry.slots.remove(&self.name);
    }
}

/// A parsed JSONP script: `name(<json>);`
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptCallback {
    /// Function the script calls
    pub name: String,
    /// Argument it passes
    pub payload: Value,
}

impl ScriptCallback {
    /// Parse a JSONP script body
    ///
    /// Returns `None` when the body is not a single call with a JSON
    /// argument, the same situation in which a browser would run the script
    /// without ever reaching the callback.
    #[must_use]
    pub fn parse(script: &str) -> Option<Self> {
        let script = script.trim();
        let script = script.strip_prefix("/**/").unwrap_or(script).trim_start();
        let open = script.find('(')?;
        let name = script[..open].trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
        {
            return None;
        }

        let rest = script[open + 1..].trim_end();
        let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
        let inner = rest.strip_suffix(')')?;
        let payload = serde_json::from_str(inner.trim()).ok()?;

        Some(Self {
            name: name.to_string(),
            payload,
        })
    }

    /// Dispatch to the registry; returns whether a binding received it
    pub fn run(self, registry: &CallbackRegistry) -> bool {
        registry.invoke(&self.name, self.payload)
    }
}
