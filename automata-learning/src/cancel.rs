use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::LearnerError;

/// A cheap, cloneable flag checked cooperatively at loop tops inside
/// [`crate::ttt::Ttt::refine`] and [`crate::rpni::Rpni::learn`]. Cancellation
/// is checked between algorithmic steps, never in the middle of one, so a
/// cancelled learner is always left in a structurally consistent state.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Visible to every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<(), LearnerError> {
        if self.is_cancelled() {
            Err(LearnerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_visible_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(matches!(token.check(), Err(LearnerError::Cancelled)));
    }
}
