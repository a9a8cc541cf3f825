//! Browser location seam. The core reads the current URL and rewrites it
//! through this trait so it never depends on a concrete window object.

use std::sync::{Mutex, PoisonError};
use url::Url;

pub trait History: Send + Sync {
    fn location(&self) -> Url;

    /// Replaces the current entry without navigating or adding an entry.
    fn replace(&self, url: Url);

    /// Navigates to `url`, adding a history entry.
    fn push(&self, url: Url);
}

/// In-memory history stack, used by the CLI and by tests.
#[derive(Debug)]
pub struct MemoryHistory {
    stack: Mutex<Stack>,
}

#[derive(Debug)]
struct Stack {
    current: Url,
    previous: Vec<Url>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new(initial: Url) -> Self {
        Self {
            stack: Mutex::new(Stack {
                current: initial,
                previous: Vec::new(),
            }),
        }
    }

    /// Number of entries, the current one included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .previous
            .len()
            + 1
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Url {
        self.stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    fn replace(&self, url: Url) {
        self.stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current = url;
    }

    fn push(&self, url: Url) {
        let mut stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut stack.current, url);
        stack.previous.push(previous);
    }
}

/// `origin + path` of `url`, dropping query and fragment.
#[must_use]
pub fn without_query_and_fragment(url: &Url) -> Url {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    clean
}

/// The site root (`origin + "/"`).
#[must_use]
pub fn site_root(url: &Url) -> Url {
    let mut root = without_query_and_fragment(url);
    root.set_path("/");
    root
}
