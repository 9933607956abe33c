//! JSONP callback bookkeeping
//!
//! Every wiki request that asks for a `callback=` wrapped response registers a
//! fresh callback name for the lifetime of the call. The name comes from a
//! process-wide counter, so overlapping calls never collide, and the registration
//! is dropped exactly once when the call settles, whichever way it settles.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::RetrieveError;

pub const CALLBACK_PREFIX: &str = "jsonpCallback_";

static NEXT_CALLBACK: AtomicU64 = AtomicU64::new(1);

/// In-flight callback names
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    pending: Mutex<HashSet<String>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a new, unique callback name. The name is released when the
    /// returned guard is dropped.
    pub fn register(&self) -> CallbackGuard<'_> {
        let n = NEXT_CALLBACK.fetch_add(1, Ordering::Relaxed);
        let name = format!("{CALLBACK_PREFIX}{n}");
        self.lock().insert(name.clone());
        CallbackGuard {
            registry: self,
            name,
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().iter().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked mid-insert.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registration of one callback name
#[derive(Debug)]
pub struct CallbackGuard<'a> {
    registry: &'a CallbackRegistry,
    name: String,
}

impl CallbackGuard<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strip the `name(...)` wrapper from a response body and return the JSON inside.
    ///
    /// Accepts the `/**/` prefix MediaWiki emits, a trailing `;`, and surrounding
    /// whitespace. A body addressed to a different callback is rejected.
    pub fn payload<'b>(&self, body: &'b str) -> Result<&'b str, RetrieveError> {
        let trimmed = body.trim();
        let trimmed = trimmed.strip_prefix("/**/").unwrap_or(trimmed).trim_start();
        let inner = trimmed
            .strip_prefix(self.name.as_str())
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix('('))
            .map(|rest| rest.trim_end().trim_end_matches(';').trim_end())
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| {
                RetrieveError::fetch(format!(
                    "response is not addressed to callback {}",
                    self.name
                ))
            })?;
        Ok(inner)
    }
}

impl Drop for CallbackGuard<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.name);
    }
}
