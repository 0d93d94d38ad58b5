use std::{cell::Cell, rc::Rc};

///
/// CancelToken
///
/// Identity of one logical query. It stays current until its coordinator
/// issues a newer token or cancels; after that it never becomes current
/// again.
///

#[derive(Clone, Debug)]
pub struct CancelToken {
    epoch: u64,
    current: Rc<Cell<u64>>,
}

impl CancelToken {
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.get() == self.epoch
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }
}

///
/// CancellationCoordinator
///
/// One active token per consumer.
///

#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    current: Rc<Cell<u64>>,
}

impl CancellationCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token, permanently invalidating every earlier one.
    #[must_use]
    pub fn new_token(&self) -> CancelToken {
        let epoch = self.current.get().wrapping_add(1);
        self.current.set(epoch);

        CancelToken {
            epoch,
            current: Rc::clone(&self.current),
        }
    }

    #[must_use]
    pub fn is_current(&self, token: &CancelToken) -> bool {
        Rc::ptr_eq(&self.current, &token.current) && token.is_current()
    }

    /// Invalidate every outstanding token without issuing a new one.
    pub fn cancel(&self) {
        self.current.set(self.current.get().wrapping_add(1));
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_token_supersedes_older() {
        let coordinator = CancellationCoordinator::new();
        let a = coordinator.new_token();
        let b = coordinator.new_token();

        assert!(!coordinator.is_current(&a));
        assert!(coordinator.is_current(&b));
    }

    #[test]
    fn cancel_invalidates_without_replacement() {
        let coordinator = CancellationCoordinator::new();
        let a = coordinator.new_token();

        coordinator.cancel();

        assert!(!a.is_current());
        let b = coordinator.new_token();
        assert!(b.is_current());
        assert!(!a.is_current(), "an old token never becomes current again");
    }

    #[test]
    fn tokens_from_other_coordinators_are_never_current() {
        let one = CancellationCoordinator::new();
        let two = CancellationCoordinator::new();
        let token = one.new_token();
        let _ = two.new_token();

        assert!(!two.is_current(&token));
    }
}
