//! Shared bytecode-assembly helpers for the integration tests.
//!
//! Grounded on the teacher's `ChunkBuilder` (`src/backend/bytecode/chunk.rs`):
//! a small fluent builder over raw bytes, since a script is just bytes plus
//! the opcodes and VLQ encoding the crate already exposes publicly.

#![allow(dead_code)]

use delftproto::opcodes::Opcode;
use delftproto::script::{encode_vlq, Script};

/// Assembles a whole installed script: the `DEF_VM_EX` prologue, any number
/// of `DEF_FUN`s (each returning its own global index), and `EXIT`.
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        ScriptBuilder { bytes: Vec::new() }
    }

    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.bytes.push(op as u8);
        self
    }

    pub fn vlq(&mut self, n: u32) -> &mut Self {
        self.bytes.extend(encode_vlq(n));
        self
    }

    /// `DEF_VM_EX stack env globals threads state exports max_call_depth`.
    pub fn def_vm_ex(&mut self, sizes: [u32; 7]) -> &mut Self {
        self.op(Opcode::DefVmEx);
        for n in sizes {
            self.vlq(n);
        }
        self
    }

    pub fn activate(&mut self, thread: u32) -> &mut Self {
        self.op(Opcode::Activate);
        self.vlq(thread)
    }

    /// Appends a `DEF_FUN` wrapping `body`. Each call pushes one more entry
    /// onto `globals`, in order — the caller tracks the resulting index
    /// (first `def_fun` is global 0, second is global 1, ...) the same way
    /// a compiler emitting this prologue would.
    pub fn def_fun(&mut self, body: &[u8]) -> &mut Self {
        self.op(Opcode::DefFun);
        self.vlq(body.len() as u32);
        self.bytes.extend_from_slice(body);
        self
    }

    pub fn exit(&mut self) -> &mut Self {
        self.op(Opcode::Exit)
    }

    pub fn build(&self) -> Script {
        Script::new(self.bytes.clone())
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        ScriptBuilder::new()
    }
}

/// Assembles a `DEF_FUN` body (a plain byte run — no separate opcode table
/// needed, since the body is just bytes interpreted by the same cursor as
/// everything else).
pub struct Body {
    bytes: Vec<u8>,
}

impl Body {
    pub fn new() -> Self {
        Body { bytes: Vec::new() }
    }

    pub fn op(mut self, op: Opcode) -> Self {
        self.bytes.push(op as u8);
        self
    }

    pub fn vlq(mut self, n: u32) -> Self {
        self.bytes.extend(encode_vlq(n));
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.bytes.extend(v.to_be_bytes());
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Byte length so far, without consuming — used to compute `IF`/`JMP`
    /// skip distances before the block itself is spliced in.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::new()
    }
}

/// Drives `step()` to completion — either the install-time prologue running
/// to `EXIT`, or a round running to its final `RET`. Asserts the
/// stacks-empty-at-`finished()` invariant on the way out.
pub fn run_to_finished<P: delftproto::host::Platform>(m: &mut delftproto::Machine<P>) {
    while !m.finished() {
        m.step().expect("script should not fail in a test fixture");
    }
    assert!(m.stacks_idle(), "exec/env stacks must be empty once finished() is true");
}
