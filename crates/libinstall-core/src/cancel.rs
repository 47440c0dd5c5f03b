//! Cancellation token for long-running installs.
//!
//! Repository clones and archive extraction poll this token so a caller on
//! another thread can abort them. Aborted installs still clean up their
//! temporary directories.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::LibraryError;

/// A cancellation token shared between the caller and a running install.
///
/// Clones share state: cancelling any clone cancels them all.
///
/// # Example
///
/// ```
/// use libinstall::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
///
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `LibraryError::Cancelled` if cancellation has been requested.
    pub fn check(&self) -> Result<(), LibraryError> {
        if self.is_cancelled() {
            Err(LibraryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token2.is_cancelled());
        assert!(matches!(token2.check(), Err(LibraryError::Cancelled)));
    }

    #[test]
    fn test_default() {
        let token = CancellationToken::default();
        assert!(!token.is_cancelled());
    }
}
