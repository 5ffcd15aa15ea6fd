/// Runs a cleanup function when dropped.
///
/// Used to put the terminal back in order on every way out of `main`,
/// including a panic unwinding through it.
///
/// ```
/// use remote_pilot::utils::guard::ExitGuard;
///
/// let _guard = ExitGuard::new(|| println!("terminal restored"));
/// ```
pub struct ExitGuard<F: FnOnce()> {
    on_exit: Option<F>,
}

impl<F: FnOnce()> ExitGuard<F> {
    pub fn new(on_exit: F) -> Self {
        Self { on_exit: Some(on_exit) }
    }

    /// Drop the guard without running the cleanup.
    pub fn disarm(mut self) {
        self.on_exit = None;
    }
}

impl<F: FnOnce()> Drop for ExitGuard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.on_exit.take() {
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_runs_once_on_drop() {
        let runs = Cell::new(0);
        {
            let _guard = ExitGuard::new(|| runs.set(runs.get() + 1));
        }
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_disarm_skips_cleanup() {
        let runs = Cell::new(0);
        ExitGuard::new(|| runs.set(runs.get() + 1)).disarm();
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn test_runs_during_unwind() {
        let ran = std::sync::atomic::AtomicBool::new(false);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ExitGuard::new(|| ran.store(true, std::sync::atomic::Ordering::SeqCst));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
