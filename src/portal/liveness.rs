use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared "still mounted" flag. Async work checks it before applying a result
/// so a response arriving after teardown never touches shared state.
#[derive(Clone, Debug)]
pub struct Liveness(Arc<AtomicBool>);

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Marks the owner as torn down. Returns `true` for the call that flipped it.
    pub fn kill(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}
