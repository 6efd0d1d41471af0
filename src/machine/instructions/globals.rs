//! `GLO_REF`/`GLO_REF16` and their fused small-immediate forms.
//!
//! Globals are addressed absolutely from index 0 (the first value defined
//! during install), unlike the environment stack's top-relative addressing.

use crate::error::VmResult;
use crate::host::Platform;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    pub(crate) fn op_glo_ref(&mut self) -> VmResult<()> {
        let i = self.read_vlq()? as usize;
        self.glo_ref(i)
    }

    pub(crate) fn op_glo_ref16(&mut self) -> VmResult<()> {
        let i = self.read_u16()? as usize;
        self.glo_ref(i)
    }

    /// `globals[index]` is an absolute, bottom-based index — the order
    /// `DEF`/`DEF_FUN`/etc. pushed entries during install, not top-relative
    /// like the environment stack (`original_source/vm/src/vm/instructions/globals.cpp`'s
    /// `machine.globals[index]`).
    pub(crate) fn glo_ref(&mut self, index: usize) -> VmResult<()> {
        let v = self.globals.get(index)?.clone();
        self.exec.push(v)
    }
}
