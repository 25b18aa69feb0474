//! Transaction lock
//!
//! The filesystem brackets each logical operation with a transaction.
//! Transports delegate that bracket to a [`TransactionLock`].

use crate::flash::FlashError;

/// Mutual exclusion for one logical flash operation
pub trait TransactionLock {
    /// Take the lock, blocking until it is free or the lock gives up
    fn acquire(&mut self) -> Result<(), FlashError>;

    /// Give the lock back
    fn release(&mut self) -> Result<(), FlashError>;
}

/// Lock for single-context builds where exclusive `&mut` access suffices
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLock;

impl TransactionLock for NoLock {
    fn acquire(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    fn release(&mut self) -> Result<(), FlashError> {
        Ok(())
    }
}

#[cfg(feature = "timed-lock")]
pub use timed::TimedLock;

#[cfg(feature = "timed-lock")]
mod timed {
    use super::TransactionLock;
    use crate::flash::FlashError;
    use embassy_time::{Duration, Instant};
    use portable_atomic::{AtomicBool, Ordering};

    /// Spin lock shared with every other user of the same flash device
    ///
    /// The flag lives in a `static` so that, for example, a firmware
    /// updater and the filesystem serialize on the same device. Uses
    /// `portable-atomic` so it also works on cores without CAS (Cortex-M0+).
    pub struct TimedLock {
        flag: &'static AtomicBool,
        timeout: Duration,
    }

    impl TimedLock {
        /// Create a lock over a shared flag
        pub const fn new(flag: &'static AtomicBool, timeout: Duration) -> Self {
            Self { flag, timeout }
        }
    }

    impl TransactionLock for TimedLock {
        fn acquire(&mut self) -> Result<(), FlashError> {
            let deadline = Instant::now() + self.timeout;
            loop {
                if self
                    .flag
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(FlashError::LockTimeout);
                }
                core::hint::spin_loop();
            }
        }

        fn release(&mut self) -> Result<(), FlashError> {
            if self.flag.swap(false, Ordering::Release) {
                Ok(())
            } else {
                Err(FlashError::LockNotHeld)
            }
        }
    }
}
