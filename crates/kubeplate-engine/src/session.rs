//! Per-render state shared by nested `include` calls
//!
//! Every render creates one [`RenderSession`] and places it in the template
//! context under [`SESSION_KEY`]. `include` passes the same handle on to the
//! sub-template it renders, so the counters follow the whole call tree of one
//! render and nothing else.
//!
//! [`SESSION_KEY`] is reserved. Templates can see the handle but not use it,
//! and `include` data cannot replace it. Rebinding the name to anything else
//! makes the next `include` fail instead of starting fresh counters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use minijinja::value::{Object, ObjectRepr, Value};
use minijinja::{Error, ErrorKind, State};

use crate::config::DEFAULT_MAX_INCLUDE_DEPTH;

/// Context key holding the session handle
pub const SESSION_KEY: &str = "__kubeplate_session";

/// Active `include` counters of one render, keyed by template name
#[derive(Debug)]
pub struct RenderSession {
    max_depth: usize,
    active: Mutex<HashMap<String, usize>>,
}

impl Object for RenderSession {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }
}

impl RenderSession {
    pub fn new(max_depth: usize) -> Arc<Self> {
        Arc::new(Self {
            max_depth,
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Session reachable from the current template context
    ///
    /// Falls back to a session stored in the render state when the template
    /// was rendered without one. A reserved name bound to anything other
    /// than a session is an error.
    pub fn current(state: &State) -> Result<Arc<Self>, Error> {
        let Some(value) = state.lookup(SESSION_KEY) else {
            return Ok(state.get_or_set_temp_object(SESSION_KEY, || RenderSession {
                max_depth: DEFAULT_MAX_INCLUDE_DEPTH,
                active: Mutex::new(HashMap::new()),
            }));
        };

        value.downcast_object::<RenderSession>().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("`{}` is reserved for the include counters", SESSION_KEY),
            )
        })
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of active invocations of `name`
    pub fn depth(&self, name: &str) -> usize {
        self.counters().get(name).copied().unwrap_or(0)
    }

    /// Register one more active invocation of `name`
    ///
    /// Returns `None` once the counter has passed the limit. The counter is
    /// released when the returned guard is dropped.
    pub fn enter(self: &Arc<Self>, name: &str) -> Option<IncludeGuard> {
        let mut counters = self.counters();
        let count = counters.entry(name.to_string()).or_insert(0);
        if *count > self.max_depth {
            return None;
        }
        *count += 1;

        Some(IncludeGuard {
            session: Arc::clone(self),
            name: name.to_string(),
        })
    }

    /// The handle as a template value
    pub fn to_value(self: &Arc<Self>) -> Value {
        Value::from_dyn_object(Arc::clone(self))
    }

    fn counters(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases one active invocation on drop
#[derive(Debug)]
pub struct IncludeGuard {
    session: Arc<RenderSession>,
    name: String,
}

impl Drop for IncludeGuard {
    fn drop(&mut self) {
        let mut counters = self.session.counters();
        if let Some(count) = counters.get_mut(&self.name) {
            *count = count.saturating_sub(1);
        }
    }
}
