//! Immediate-literal opcodes. `LIT_N<k>`/`INF`/`NEG_INF` are simple enough
//! to stay inline in `dispatch`; this module covers the ones with operand
//! bytes to decode.

use crate::error::VmResult;
use crate::host::Platform;
use crate::value::Value;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    pub(crate) fn op_lit8(&mut self) -> VmResult<()> {
        let b = self.read_u8()?;
        self.exec.push(Value::Number(b as f32))
    }

    pub(crate) fn op_lit16(&mut self) -> VmResult<()> {
        let v = self.read_u16()?;
        self.exec.push(Value::Number(v as f32))
    }

    pub(crate) fn op_lit(&mut self) -> VmResult<()> {
        let v = self.read_vlq()?;
        self.exec.push(Value::Number(v as f32))
    }

    pub(crate) fn op_lit_flo(&mut self) -> VmResult<()> {
        let v = self.read_f32()?;
        self.exec.push(Value::Number(v))
    }
}
