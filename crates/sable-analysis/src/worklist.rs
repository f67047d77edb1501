use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;

use rustc_hash::FxHashSet;

/// Error raised when inspecting an empty working set.
#[derive(Debug, thiserror::Error)]
pub enum WorkingSetError {
    #[error("the working set is empty")]
    Empty,
}

/// The pending set of elements scheduled for (re)analysis.
///
/// No thread-safety: the driver owns its working set outright.
pub trait WorkingSet<T> {
    fn push(&mut self, element: T);
    fn pop(&mut self) -> Result<T, WorkingSetError>;
    fn peek(&self) -> Result<&T, WorkingSetError>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First-in-first-out scheduling.
#[derive(Debug)]
pub struct FifoWorkingSet<T> {
    queue: VecDeque<T>,
}

impl<T> Default for FifoWorkingSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FifoWorkingSet<T> {
    pub fn new() -> Self {
        FifoWorkingSet {
            queue: VecDeque::new(),
        }
    }
}

impl<T> WorkingSet<T> for FifoWorkingSet<T> {
    fn push(&mut self, element: T) {
        self.queue.push_back(element);
    }

    fn pop(&mut self) -> Result<T, WorkingSetError> {
        self.queue.pop_front().ok_or(WorkingSetError::Empty)
    }

    fn peek(&self) -> Result<&T, WorkingSetError> {
        self.queue.front().ok_or(WorkingSetError::Empty)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Last-in-first-out scheduling.
#[derive(Debug)]
pub struct LifoWorkingSet<T> {
    stack: Vec<T>,
}

impl<T> Default for LifoWorkingSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LifoWorkingSet<T> {
    pub fn new() -> Self {
        LifoWorkingSet { stack: Vec::new() }
    }
}

impl<T> WorkingSet<T> for LifoWorkingSet<T> {
    fn push(&mut self, element: T) {
        self.stack.push(element);
    }

    fn pop(&mut self) -> Result<T, WorkingSetError> {
        self.stack.pop().ok_or(WorkingSetError::Empty)
    }

    fn peek(&self) -> Result<&T, WorkingSetError> {
        self.stack.last().ok_or(WorkingSetError::Empty)
    }

    fn len(&self) -> usize {
        self.stack.len()
    }
}

/// Wrapper that silently rejects pushes of elements already enqueued.
#[derive(Debug)]
pub struct DuplicateFree<T, W> {
    inner: W,
    enqueued: FxHashSet<T>,
}

impl<T: Clone + Eq + Hash, W: WorkingSet<T> + Default> Default for DuplicateFree<T, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash, W: WorkingSet<T> + Default> DuplicateFree<T, W> {
    pub fn new() -> Self {
        DuplicateFree {
            inner: W::default(),
            enqueued: FxHashSet::default(),
        }
    }
}

impl<T: Clone + Eq + Hash, W: WorkingSet<T>> WorkingSet<T> for DuplicateFree<T, W> {
    fn push(&mut self, element: T) {
        if self.enqueued.insert(element.clone()) {
            self.inner.push(element);
        }
    }

    fn pop(&mut self) -> Result<T, WorkingSetError> {
        let element = self.inner.pop()?;
        self.enqueued.remove(&element);
        Ok(element)
    }

    fn peek(&self) -> Result<&T, WorkingSetError> {
        self.inner.peek()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Which working set the fixpoint engine instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkingSetKind {
    Fifo,
    Lifo,
    #[default]
    DuplicateFreeFifo,
    DuplicateFreeLifo,
}

impl WorkingSetKind {
    pub fn instantiate<T: Clone + Eq + Hash + 'static>(self) -> Box<dyn WorkingSet<T>> {
        match self {
            WorkingSetKind::Fifo => Box::new(FifoWorkingSet::new()),
            WorkingSetKind::Lifo => Box::new(LifoWorkingSet::new()),
            WorkingSetKind::DuplicateFreeFifo => {
                Box::new(DuplicateFree::<T, FifoWorkingSet<T>>::new())
            }
            WorkingSetKind::DuplicateFreeLifo => {
                Box::new(DuplicateFree::<T, LifoWorkingSet<T>>::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_and_lifo_orders() {
        let mut fifo = FifoWorkingSet::new();
        let mut lifo = LifoWorkingSet::new();
        for i in 0..3 {
            fifo.push(i);
            lifo.push(i);
        }
        assert_eq!(fifo.pop().unwrap(), 0);
        assert_eq!(lifo.pop().unwrap(), 2);
    }

    #[test]
    fn duplicate_free_rejects_enqueued_elements() {
        let mut ws = DuplicateFree::<i32, FifoWorkingSet<i32>>::new();
        ws.push(1);
        ws.push(1);
        ws.push(2);
        assert_eq!(ws.len(), 2);
        assert_eq!(ws.pop().unwrap(), 1);
        // Once popped, the element may be enqueued again.
        ws.push(1);
        assert_eq!(ws.len(), 2);
    }

    #[test]
    fn popping_empty_fails() {
        let mut ws = LifoWorkingSet::<i32>::new();
        assert!(matches!(ws.pop(), Err(WorkingSetError::Empty)));
        assert!(matches!(ws.peek(), Err(WorkingSetError::Empty)));
    }
}
