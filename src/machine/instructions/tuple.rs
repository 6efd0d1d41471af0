//! Tuple construction and access.
//!
//! Grounded on `original_source/vm/src/vm/instructions/tup.cpp`. `FAB_TUP`
//! collects execution-stack values in their original (bottom-to-top) order
//! via `ValueStack::drain_top`, matching spec.md §4.6.

use crate::error::{VmError, VmResult};
use crate::host::Platform;
use crate::value::Value;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    pub(crate) fn op_fab_tup(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        let values = self.exec.drain_top(n)?;
        self.exec.push(Value::tuple(values))
    }

    pub(crate) fn op_fab_vec(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        self.check_tuple_alloc(n)?;
        let v = self.exec.pop()?;
        self.exec.push(Value::tuple(vec![v; n]))
    }

    pub(crate) fn op_fab_num_vec(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        self.check_tuple_alloc(n)?;
        self.exec.push(Value::tuple(vec![Value::Number(0.0); n]))
    }

    pub(crate) fn op_elt(&mut self) -> VmResult<()> {
        let index = self.exec.pop()?;
        let tuple = self.exec.pop()?;
        let i = index
            .as_number()
            .ok_or(VmError::TypeError { expected: "number", got: index.type_name() })? as usize;
        let t = tuple
            .as_tuple()
            .ok_or(VmError::TypeError { expected: "tuple", got: tuple.type_name() })?;
        let len = t.borrow().len();
        let v = t.borrow().get(i).cloned().ok_or(VmError::IndexOutOfBounds { index: i, len })?;
        self.exec.push(v)
    }

    pub(crate) fn op_len(&mut self) -> VmResult<()> {
        let v = self.exec.pop()?;
        self.exec.push(Value::Number(v.len() as f32))
    }
}
