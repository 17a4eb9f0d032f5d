//! Environment overrides shared by integration tests.

use std::env;
use std::sync::{Mutex, MutexGuard, OnceLock};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Applies environment overrides until dropped, restoring prior values.
///
/// Holds a process-wide lock so concurrent tests never observe each
/// other's overrides.
pub struct ScopedEnv {
    saved: Vec<(String, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    /// Sets (`Some`) or removes (`None`) each variable.
    pub fn apply(changes: &[(&str, Option<&str>)]) -> Self {
        let lock = ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let saved = changes
            .iter()
            .map(|&(key, value)| {
                let previous = env::var(key).ok();
                write_var(key, value);
                (key.to_owned(), previous)
            })
            .collect();
        Self { saved, _lock: lock }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..) {
            write_var(&key, previous.as_deref());
        }
    }
}

fn write_var(key: &str, value: Option<&str>) {
    // SAFETY: ENV_MUTEX serializes every environment mutation in tests.
    unsafe {
        match value {
            Some(new_value) => env::set_var(key, new_value),
            None => env::remove_var(key),
        }
    }
}
