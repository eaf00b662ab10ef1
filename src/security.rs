//! Security context with scoped elevation
//!
//! Media library writes require permission checks to be switched off for the
//! duration of the call. `SecurityContext::disable` hands out a guard; checks
//! come back on when the last guard is dropped, whatever the outcome of the
//! guarded work.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared security state
#[derive(Debug, Default)]
pub struct SecurityContext {
    disabled_depth: AtomicUsize,
}

impl SecurityContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable security checks until the returned guard is dropped.
    ///
    /// Guards nest; checks are restored when the outermost one goes away.
    pub fn disable(&self) -> SecurityDisabler<'_> {
        self.disabled_depth.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Security checks disabled");
        SecurityDisabler { context: self }
    }

    /// True while at least one `SecurityDisabler` is alive
    pub fn is_disabled(&self) -> bool {
        self.disabled_depth.load(Ordering::SeqCst) > 0
    }
}

/// RAII guard returned by [`SecurityContext::disable`]
#[must_use = "security is re-enabled as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SecurityDisabler<'a> {
    context: &'a SecurityContext,
}

impl Drop for SecurityDisabler<'_> {
    fn drop(&mut self) {
        self.context.disabled_depth.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!("Security disabler released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_on_drop() {
        let ctx = SecurityContext::new();
        assert!(!ctx.is_disabled());
        {
            let _guard = ctx.disable();
            assert!(ctx.is_disabled());
        }
        assert!(!ctx.is_disabled());
    }

    #[test]
    fn test_nested_guards() {
        let ctx = SecurityContext::new();
        let outer = ctx.disable();
        {
            let _inner = ctx.disable();
            assert!(ctx.is_disabled());
        }
        assert!(ctx.is_disabled());
        drop(outer);
        assert!(!ctx.is_disabled());
    }

    #[test]
    fn test_restored_after_error() {
        let ctx = SecurityContext::new();
        let result: Result<(), &str> = (|| {
            let _guard = ctx.disable();
            Err("failed")
        })();
        assert!(result.is_err());
        assert!(!ctx.is_disabled());
    }
}
