//! Fixed-capacity stacks (C2).
//!
//! Grounded on `src/backend/bytecode/vm/stack.rs` for the push/pop/peek
//! naming and `original_source/vm/src/vm/stack.hpp` for the fixed-capacity
//! contract: a stack never grows past the capacity declared at install
//! time (spec.md §3, invariant S1).

use smallvec::SmallVec;
use tracing::trace;

use crate::error::{VmError, VmResult};
use crate::value::Value;

/// Small-`n` element buffer for `drain_top`: `LET n` and `FAB_TUP n` almost
/// always move a handful of values, so this avoids a heap allocation on the
/// common path.
pub type ValueBuf = SmallVec<[Value; 4]>;

/// A fixed-capacity LIFO of [`Value`]. Used for both the execution stack and
/// the environment stack — they differ only in how instructions address
/// into them (top-relative vs. offset-from-top local slots).
#[derive(Debug, Default)]
pub struct ValueStack {
    data: Vec<Value>,
    capacity: usize,
}

impl ValueStack {
    pub fn new(capacity: usize) -> Self {
        ValueStack {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn reset(&mut self, capacity: usize) {
        self.data.clear();
        self.data.reserve(capacity.saturating_sub(self.data.capacity()));
        self.capacity = capacity;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        if self.data.len() >= self.capacity {
            return Err(VmError::StackOverflow);
        }
        trace!(target: "delftproto::stacks", len = self.data.len() + 1, "push");
        self.data.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        let v = self.data.pop().ok_or(VmError::StackUnderflow)?;
        trace!(target: "delftproto::stacks", len = self.data.len(), "pop");
        Ok(v)
    }

    /// Pop and discard `n` elements.
    pub fn popn(&mut self, n: usize) -> VmResult<()> {
        if self.data.len() < n {
            return Err(VmError::StackUnderflow);
        }
        self.data.truncate(self.data.len() - n);
        Ok(())
    }

    /// Peek `offset` elements from the top (0 = top).
    pub fn peek(&self, offset: usize) -> VmResult<&Value> {
        let len = self.data.len();
        if offset >= len {
            return Err(VmError::StackUnderflow);
        }
        Ok(&self.data[len - 1 - offset])
    }

    pub fn peek_mut(&mut self, offset: usize) -> VmResult<&mut Value> {
        let len = self.data.len();
        if offset >= len {
            return Err(VmError::StackUnderflow);
        }
        Ok(&mut self.data[len - 1 - offset])
    }

    /// Drain the top `n` values, preserving bottom-to-top order (used by
    /// `LET n` to migrate execution-stack values onto the environment
    /// stack, and `FAB_TUP n` to collect tuple elements).
    pub fn drain_top(&mut self, n: usize) -> VmResult<Vec<Value>> {
        if self.data.len() < n {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.data.split_off(self.data.len() - n))
    }

    /// Address by absolute offset from the base (used by `Globals`).
    pub fn get(&self, index: usize) -> VmResult<&Value> {
        self.data
            .get(index)
            .ok_or(VmError::IndexOutOfBounds { index, len: self.data.len() })
    }

    /// Mutable counterpart of [`ValueStack::get`] (used by `VMUX`'s
    /// globals write-back).
    pub fn get_mut(&mut self, index: usize) -> VmResult<&mut Value> {
        let len = self.data.len();
        self.data.get_mut(index).ok_or(VmError::IndexOutOfBounds { index, len })
    }
}

/// The globals table: stack-like during installation (pushed in program
/// order), addressed by absolute index thereafter, and never reset between
/// rounds (spec.md §3, invariant S1 exception).
pub type Globals = ValueStack;

/// A continuation pushed on the callback stack by any instruction that
/// re-enters user bytecode (spec.md §4.3). `None` is the sentinel pushed by
/// `install` and by top-level calls that have nothing left to resume.
pub type CallbackStack = Vec<Option<crate::machine::Continuation>>;
