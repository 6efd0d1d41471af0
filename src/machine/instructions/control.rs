//! Control flow and the install-time `DEF_*`/`EXIT` prologue.
//!
//! Grounded on `original_source/vm/src/vm/instructions/core.cpp` for the
//! `ALL`/`MUX`/`IF`/`JMP` family and on spec.md §4.4 for the definition
//! opcodes and the install protocol's sentinel-continuation handling
//! (spec.md §9's EXIT decision: clear the callback stack outright rather
//! than calling `retn()`).

use crate::error::VmResult;
use crate::host::Platform;
use crate::thread_table::ThreadId;
use crate::value::Value;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    pub(crate) fn op_all(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        let top = self.exec.pop()?;
        self.exec.popn(n)?;
        self.exec.push(top)
    }

    pub(crate) fn op_mux(&mut self) -> VmResult<()> {
        let cond = self.exec.pop()?;
        let false_v = self.exec.pop()?;
        let true_v = self.exec.pop()?;
        self.exec.push(if cond.is_truthy() { true_v } else { false_v })
    }

    pub(crate) fn op_vmux(&mut self) -> VmResult<()> {
        let g = self.read_vlq()? as usize;
        let cond = self.exec.pop()?;
        let false_v = self.exec.pop()?;
        let true_v = self.exec.pop()?;
        let chosen = if cond.is_truthy() { true_v } else { false_v };
        // `globals[g]` is absolute bottom-based indexing, same as `GLO_REF`.
        *self.globals.get_mut(g)? = chosen.copy();
        self.exec.push(chosen)
    }

    pub(crate) fn op_if(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        let cond = self.exec.pop()?;
        if cond.is_truthy() {
            self.skip_ip(n)
        } else {
            Ok(())
        }
    }

    pub(crate) fn op_jmp(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        self.skip_ip(n)
    }

    pub(crate) fn op_if16(&mut self) -> VmResult<()> {
        let n = self.read_u16()? as usize;
        let cond = self.exec.pop()?;
        if cond.is_truthy() {
            self.skip_ip(n)
        } else {
            Ok(())
        }
    }

    pub(crate) fn op_jmp16(&mut self) -> VmResult<()> {
        let n = self.read_u16()? as usize;
        self.skip_ip(n)
    }

    pub(crate) fn op_def_vm_ex(&mut self) -> VmResult<()> {
        let stack_size = self.read_vlq()? as usize;
        let env_size = self.read_vlq()? as usize;
        let globals_size = self.read_vlq()? as usize;
        let threads_size = self.read_vlq()? as usize;
        let state_size = self.read_vlq()? as usize;
        let exports_size = self.read_vlq()? as usize;
        let max_call_depth = self.read_vlq()? as usize;

        self.exec.reset(stack_size);
        self.env.reset(env_size);
        self.globals.reset(globals_size);
        self.threads.reset(threads_size);
        self.state.reset(state_size);
        let node_id = self.hood.self_neighbor().id;
        self.hood.reset(node_id, exports_size);
        self.max_call_depth = max_call_depth;
        self.current_thread = ThreadId(0);

        // Preserve install()'s sentinel across the resize.
        self.callbacks.clear();
        self.callbacks.push(None);
        Ok(())
    }

    pub(crate) fn op_exit(&mut self) -> VmResult<()> {
        self.callbacks.clear();
        Ok(())
    }

    pub(crate) fn op_def_fun(&mut self) -> VmResult<()> {
        let size = self.read_vlq()? as usize;
        let entry = Value::Address(self.ip);
        self.globals.push(entry)?;
        self.skip_ip(size)
    }

    pub(crate) fn op_def(&mut self) -> VmResult<()> {
        let v = self.read_f32()?;
        self.globals.push(Value::Number(v))
    }

    pub(crate) fn op_def_tup(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        self.check_tuple_alloc(n)?;
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(Value::Number(self.read_f32()?));
        }
        self.globals.push(Value::tuple(values))
    }

    pub(crate) fn op_def_vec(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        self.check_tuple_alloc(n)?;
        let v = self.read_f32()?;
        self.globals.push(Value::tuple(vec![Value::Number(v); n]))
    }

    pub(crate) fn op_def_num_vec(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        self.check_tuple_alloc(n)?;
        self.globals.push(Value::tuple(vec![Value::Number(0.0); n]))
    }
}
