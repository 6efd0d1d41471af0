//! Feedback cells: `INIT_FEEDBACK`, `SET_FEEDBACK`, and the deprecated MIT
//! `FEEDBACK` form.
//!
//! Grounded on `original_source/vm/src/vm/instructions/feedback.cpp` and
//! the GC contract in `state.rs`/spec.md §4.5: any cell touched this round
//! must be marked, or it resets to `Undefined` at the owning thread's next
//! `gc_thread`.

use crate::error::VmResult;
use crate::thread_table::ThreadId;

use crate::host::Platform;
use crate::machine::Continuation;
use crate::value::Value;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    /// `INIT_FEEDBACK i`: pop an initializer function address. If `state[i]`
    /// already holds data, push a copy of it without calling the
    /// initializer. Otherwise call it and let the continuation store its
    /// result.
    pub(crate) fn op_init_feedback(&mut self) -> VmResult<()> {
        let i = self.read_vlq()? as usize;
        let initializer = self.pop_address_value()?;
        self.state.mark_executed(i, self.owning_thread())?;
        let existing = self.state.get(i)?.data.clone();
        if matches!(existing, Value::Undefined) {
            self.call(initializer, Some(Continuation::InitFeedback { cell: i }))
        } else {
            self.exec.push(existing)
        }
    }

    pub(crate) fn resume_init_feedback(&mut self, cell: usize, r: Value) -> VmResult<()> {
        self.state.get_mut(cell)?.data = r;
        Ok(())
    }

    /// `SET_FEEDBACK i`: write the top of stack into `state[i]` without
    /// popping it.
    pub(crate) fn op_set_feedback(&mut self) -> VmResult<()> {
        let i = self.read_vlq()? as usize;
        let v = self.exec.peek(0)?.clone();
        self.state.mark_executed(i, self.owning_thread())?;
        self.state.get_mut(i)?.data = v;
        Ok(())
    }

    /// `FEEDBACK i` (deprecated): pop the new value and one scratch value
    /// below it, store the new value, then push it back.
    pub(crate) fn op_feedback(&mut self) -> VmResult<()> {
        let i = self.read_vlq()? as usize;
        let v = self.exec.pop()?;
        let _discarded = self.exec.pop()?;
        self.state.mark_executed(i, self.owning_thread())?;
        self.state.get_mut(i)?.data = v.clone();
        self.exec.push(v)
    }

    fn pop_address_value(&mut self) -> VmResult<usize> {
        let v = self.exec.pop()?;
        v.as_address()
            .ok_or(crate::error::VmError::TypeError { expected: "address", got: v.type_name() })
    }

    fn owning_thread(&self) -> ThreadId {
        self.current_thread
    }
}
