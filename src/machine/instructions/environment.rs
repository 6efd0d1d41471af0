//! `LET`/`POP_LET`/`REF` and their fused small-immediate forms.
//!
//! Grounded on `original_source/vm/src/vm/instructions/env.cpp`: the
//! environment stack holds closed-over locals, addressed by offset from its
//! top (`REF 0` is the most recently `LET`-bound value).

use crate::error::VmResult;
use crate::host::Platform;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    pub(crate) fn op_let(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        self.let_n(n)
    }

    pub(crate) fn op_pop_let(&mut self) -> VmResult<()> {
        let n = self.read_vlq()? as usize;
        self.env.popn(n)
    }

    pub(crate) fn op_ref(&mut self) -> VmResult<()> {
        let k = self.read_vlq()? as usize;
        self.ref_k(k)
    }

    pub(crate) fn let_n(&mut self, n: usize) -> VmResult<()> {
        let values = self.exec.drain_top(n)?;
        for v in values {
            self.env.push(v)?;
        }
        Ok(())
    }

    pub(crate) fn ref_k(&mut self, k: usize) -> VmResult<()> {
        let v = self.env.peek(k)?.clone();
        self.exec.push(v)
    }
}
