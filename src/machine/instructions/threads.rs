//! Thread bookkeeping opcodes: `ACTIVATE`, `DEACTIVATE`, `TRIGGER`,
//! `RESULT`, `DT`, `SET_DT`, and the `CTRL_C_TRIGGER` extension.
//!
//! Grounded on `original_source/vm/src/vm/instructions/thread.cpp` and
//! spec.md §5's scheduler contract. `ACTIVATE`/`DEACTIVATE`/`TRIGGER`/
//! `RESULT`/`CTRL_C_TRIGGER` read a thread index operand; `DT`/`SET_DT`
//! have none and always act on the currently running thread (spec.md
//! §4.6). None of these call into bytecode, so no continuation is needed.

use crate::error::VmResult;
use crate::host::Platform;
use crate::thread_table::ThreadId;
use crate::value::Value;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    pub(crate) fn op_activate(&mut self) -> VmResult<()> {
        let t = self.read_vlq()? as usize;
        self.threads.get_mut(ThreadId(t))?.active = true;
        Ok(())
    }

    pub(crate) fn op_deactivate(&mut self) -> VmResult<()> {
        let t = self.read_vlq()? as usize;
        self.threads.get_mut(ThreadId(t))?.active = false;
        Ok(())
    }

    pub(crate) fn op_trigger(&mut self) -> VmResult<()> {
        let t = self.read_vlq()? as usize;
        self.threads.get_mut(ThreadId(t))?.triggered = true;
        Ok(())
    }

    /// Push the last round's result for thread `t`, or `Undefined` if it
    /// has never completed a round.
    pub(crate) fn op_result(&mut self) -> VmResult<()> {
        let t = self.read_vlq()? as usize;
        let v = self.threads.get(ThreadId(t))?.result.clone();
        self.exec.push(v)
    }

    /// `DT`: push the elapsed time since the *current* thread's last
    /// completed round (`start_time - last_time`), or its `desired_period`
    /// if it has never run before (spec.md §4.6). Unlike `ACTIVATE`/
    /// `DEACTIVATE`/`TRIGGER`/`RESULT`, this has no thread-index operand —
    /// it always reads the thread that is executing it.
    pub(crate) fn op_dt(&mut self) -> VmResult<()> {
        let thread = self.threads.get(self.current_thread)?;
        let dt = match thread.last_time {
            Some(last) => self.start_time - last,
            None => thread.desired_period,
        };
        self.exec.push(Value::Number(dt as f32))
    }

    /// `SET_DT`: peek (not pop) the top-of-stack number and assign it as the
    /// current thread's `desired_period`. The scheduler never reads it back
    /// (spec.md §5: observational only).
    pub(crate) fn op_set_dt(&mut self) -> VmResult<()> {
        let v = self.exec.peek(0)?.as_number().unwrap_or(0.0) as f64;
        let thread = self.current_thread;
        self.threads.get_mut(thread)?.desired_period = v;
        Ok(())
    }

    /// `CTRL_C_TRIGGER t` (extension, spec.md §5): arm thread `t` to accept
    /// one ctrl-c delivery via [`Machine::deliver_ctrl_c`]. This only
    /// registers the thread — it does not trigger it — matching
    /// `original_source/vm/src/vm-extensions/ctrl-c-trigger/instructions.cpp`'s
    /// `CTRL_C_TRIGGER`, which sets the flag and installs the signal handler
    /// without calling `trigger()` itself; the handler does that later, out
    /// of band, when the signal actually arrives.
    pub(crate) fn op_ctrl_c_trigger(&mut self) -> VmResult<()> {
        let t = self.read_vlq()? as usize;
        self.threads.get_mut(ThreadId(t))?.ctrl_c_triggered = true;
        Ok(())
    }
}
