//! Higher-order instructions: `APPLY`, `TUP_MAP`, `FOLD`, and their
//! MIT-deprecated forms (`VFOLD`, `MAP`, `TUP`).
//!
//! Grounded on `original_source/vm/src/vm/instructions/hof.cpp`. The
//! original resumes these through file-scoped globals holding the
//! in-progress iterator; spec.md §9 calls for replacing that with an
//! explicit [`Continuation`] carried on the callback stack, which is what
//! every `op_*`/`resume_*` pair here does.

use crate::error::{VmError, VmResult};
use crate::host::Platform;
use crate::machine::Continuation;
use crate::stacks::ValueBuf;
use crate::value::Value;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    /// `APPLY`: pop an argument tuple and a function address, push each
    /// argument onto the environment stack in order, and call.
    pub(crate) fn op_apply(&mut self) -> VmResult<()> {
        let args = self.pop_tuple()?;
        let func = self.pop_address()?;
        let elements: ValueBuf = args.borrow().iter().cloned().collect();
        let arg_count = elements.len();
        for v in elements {
            self.env.push(v)?;
        }
        self.call(func, Some(Continuation::Apply { arg_count }))
    }

    pub(crate) fn resume_apply(&mut self, arg_count: usize) -> VmResult<()> {
        self.env.popn(arg_count)
    }

    /// `TUP_MAP`: pop a source tuple and a function address, map the
    /// function over each element left to right.
    pub(crate) fn op_tup_map(&mut self) -> VmResult<()> {
        let source = self.pop_tuple_value()?;
        let func = self.pop_address()?;
        let len = source.len();
        if len == 0 {
            return self.exec.push(Value::tuple(Vec::new()));
        }
        let result = Value::tuple(Vec::with_capacity(len));
        let first = source.as_tuple().expect("pop_tuple_value returns a Tuple").borrow()[0].clone();
        self.env.push(first)?;
        self.call(func, Some(Continuation::TupMap { func, source, result, index: 1 }))
    }

    pub(crate) fn resume_tup_map(
        &mut self,
        func: usize,
        source: Value,
        result: Value,
        index: usize,
        _r: Value,
    ) -> VmResult<()> {
        self.env.popn(1)?;
        let mapped = self.exec.pop()?;
        result.push(mapped);
        let elements_len = source.len();
        if index < elements_len {
            let next = source.as_tuple().expect("TupMap source is always a Tuple").borrow()[index].clone();
            self.env.push(next)?;
            self.call(func, Some(Continuation::TupMap { func, source, result, index: index + 1 }))
        } else {
            self.exec.push(result)
        }
    }

    /// `FOLD`: pop a source tuple, a starting accumulator, and a fuse
    /// function; fold left to right.
    pub(crate) fn op_fold(&mut self) -> VmResult<()> {
        let source = self.pop_tuple_value()?;
        let acc = self.exec.pop()?;
        let func = self.pop_address()?;
        let len = source.len();
        if len == 0 {
            return self.exec.push(acc);
        }
        let first = source.as_tuple().expect("pop_tuple_value returns a Tuple").borrow()[0].clone();
        self.env.push(acc)?;
        self.env.push(first)?;
        self.call(func, Some(Continuation::Fold { func, source, index: 1 }))
    }

    pub(crate) fn resume_fold(&mut self, func: usize, source: Value, index: usize, _r: Value) -> VmResult<()> {
        self.env.popn(2)?;
        let acc = self.exec.pop()?;
        let len = source.len();
        if index < len {
            let next = source.as_tuple().expect("Fold source is always a Tuple").borrow()[index].clone();
            self.env.push(acc)?;
            self.env.push(next)?;
            self.call(func, Some(Continuation::Fold { func, source, index: index + 1 }))
        } else {
            self.exec.push(acc)
        }
    }

    /// `VFOLD idx` (deprecated): identical to `FOLD`, with an extra index
    /// byte that the MIT dialect used to select a globals write-back slot.
    /// Per DESIGN.md's open-question resolution, the write-back is dropped;
    /// the index byte is read and discarded.
    pub(crate) fn op_vfold(&mut self) -> VmResult<()> {
        let _idx = self.read_vlq()?;
        self.op_fold()
    }

    /// `MAP idx` (deprecated alias of `TUP_MAP`).
    pub(crate) fn op_map(&mut self) -> VmResult<()> {
        let _idx = self.read_vlq()?;
        self.op_tup_map()
    }

    /// `TUP idx` (deprecated alias of `FAB_TUP`).
    pub(crate) fn op_tup(&mut self) -> VmResult<()> {
        let _idx = self.read_vlq()?;
        self.op_fab_tup()
    }

    fn pop_tuple(&mut self) -> VmResult<crate::value::TupleData> {
        let v = self.exec.pop()?;
        v.as_tuple()
            .cloned()
            .ok_or(VmError::TypeError { expected: "tuple", got: v.type_name() })
    }

    fn pop_tuple_value(&mut self) -> VmResult<Value> {
        let v = self.exec.pop()?;
        if v.as_tuple().is_some() {
            Ok(v)
        } else {
            Err(VmError::TypeError { expected: "tuple", got: v.type_name() })
        }
    }
}
