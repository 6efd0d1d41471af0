//! VM-wide error type.
//!
//! Grounded on `src/backend/bytecode/vm/types.rs`'s `VmError`: a plain enum
//! with a hand-written `Display` impl rather than `thiserror`, because every
//! variant here names a bytecode invariant violation (spec.md §7's
//! `ProgrammerBug` taxonomy) and a one-line match arm per variant reads more
//! directly than a derive macro would.

use std::fmt;

pub type VmResult<T> = Result<T, VmError>;

/// Errors surfaced by the VM. With the exception of `ResourceExhaustion`
/// these are all programmer bugs in the bytecode (spec.md §7): a production
/// host should treat any of them as a reason to abort the current round.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// A stack was popped/peeked while empty.
    StackUnderflow,
    /// A push would exceed a stack's declared capacity.
    StackOverflow,
    /// `next_u8` decoded a byte with no matching `Opcode`.
    InvalidOpcode(u8),
    /// A jump/skip would move the instruction pointer past the end of the
    /// script, or (being forward-only) backwards.
    InvalidJump { from: usize, to: usize, len: usize },
    /// `ELT`, `GLO_REF`, state/thread index, etc. out of range.
    IndexOutOfBounds { index: usize, len: usize },
    /// A `Value` was read as the wrong variant (invariant V1).
    TypeError { expected: &'static str, got: &'static str },
    /// The callback stack was popped while empty, or call depth would go
    /// negative.
    CallStackUnderflow,
    /// `step()` called after `finished()` was already true.
    AlreadyFinished,
    /// A tuple allocation failed (spec.md §7 `ResourceExhaustion`).
    OutOfMemory,
    /// A ctrl-c-style host signal arrived twice before the first was
    /// serviced (spec.md §5's `CTRL_C_TRIGGER` extension).
    DoubleSignal,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::StackUnderflow => write!(f, "stack underflow"),
            VmError::StackOverflow => write!(f, "stack overflow"),
            VmError::InvalidOpcode(b) => write!(f, "invalid opcode: 0x{b:02x}"),
            VmError::InvalidJump { from, to, len } => write!(
                f,
                "invalid jump from {from} to {to} (script length {len})"
            ),
            VmError::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            VmError::TypeError { expected, got } => {
                write!(f, "type error: expected {expected}, got {got}")
            }
            VmError::CallStackUnderflow => write!(f, "call stack underflow"),
            VmError::AlreadyFinished => write!(f, "step() called after finished()"),
            VmError::OutOfMemory => write!(f, "tuple allocator exhausted"),
            VmError::DoubleSignal => write!(f, "ctrl-c signal delivered twice before servicing"),
        }
    }
}

impl std::error::Error for VmError {}
