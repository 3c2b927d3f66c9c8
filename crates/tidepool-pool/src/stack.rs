//! Concurrent stack of connection names

use parking_lot::Mutex;

/// A last-in-first-out store of connection names, safe for concurrent
/// push/pop without external synchronization.
///
/// LIFO ordering is an implementation detail. The pool relies only on every
/// pushed name eventually being popped by some caller, and on a push by one
/// thread being visible to any later pop.
#[derive(Debug, Default)]
pub struct NameStack {
    items: Mutex<Vec<String>>,
}

impl NameStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a name. Never fails.
    pub fn push(&self, name: String) {
        self.items.lock().push(name);
    }

    /// Pop the most recently pushed name, or `None` when empty.
    pub fn pop(&self) -> Option<String> {
        self.items.lock().pop()
    }

    /// Number of names currently stored
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the stack is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.items.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn push_pop_is_lifo() {
        let stack = NameStack::new();
        stack.push("a".into());
        stack.push("b".into());
        stack.push("c".into());

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop().as_deref(), Some("c"));
        assert_eq!(stack.pop().as_deref(), Some("b"));
        assert_eq!(stack.pop().as_deref(), Some("a"));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn concurrent_push_pop_conserves_names() {
        let stack = Arc::new(NameStack::new());
        for i in 0..64 {
            stack.push(format!("name_{i}"));
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let stack = Arc::clone(&stack);
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    if let Some(name) = stack.pop() {
                        stack.push(name);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker panicked");
        }

        let remaining = stack.snapshot();
        assert_eq!(remaining.len(), 64);
        let unique: std::collections::HashSet<_> = remaining.iter().collect();
        assert_eq!(unique.len(), 64);
    }
}
