//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a shared interrupt flag. Long-running loops (the
//! exhaustive permutation search, the retry controller) poll it between
//! batches and between retry iterations and stop with
//! [`ReconcileError::Cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ReconcileError, ReconcileResult};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation was requested.
    #[inline]
    pub fn check(&self) -> ReconcileResult<()> {
        if self.is_cancelled() {
            Err(ReconcileError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(token.check().is_ok());
        clone.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ReconcileError::Cancelled)));

        println!("[VERIFIED] cancel on a clone is visible to the original");
    }
}
