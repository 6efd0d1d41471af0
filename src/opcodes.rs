//! The 256-entry opcode table (C8).
//!
//! Grounded on `src/backend/bytecode/opcodes.rs`: opcodes are grouped into
//! contiguous ranges by category, one `#[repr(u8)]` variant per concrete
//! instruction, and templated forms (`LIT_N<k>`, `REF_N<k>`, ...) are
//! distinct opcodes rather than one opcode plus a runtime parameter — per
//! spec.md §9, that keeps the encoding binary-compatible with a compiler
//! that fuses the small immediate into the opcode byte.
//!
//! The extended (VLQ-operand) dialect is the only one implemented; see
//! DESIGN.md for the open-question resolution.

use std::fmt;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // === Control / meta (0x00-0x0F) ===
    /// Do nothing.
    Nop = 0x00,
    /// Return through the callback stack (spec.md §4.3).
    Ret = 0x01,
    /// `ALL n`: preserve the top element, drop the `n` below it.
    All = 0x02,
    /// Pop `false_v, true_v, cond`; push `true_v` if `cond != 0` else `false_v`.
    Mux = 0x03,
    /// `MUX`, additionally storing the chosen value's deep copy into `globals[g]`.
    VMux = 0x04,
    /// Pop `cond`; if nonzero, skip `n` bytes forward.
    If = 0x05,
    /// Unconditionally skip `n` bytes forward.
    Jmp = 0x06,
    /// Extended VM-definition prologue: 7 VLQ sizes (stack, env, globals,
    /// threads, state, exports, max-call-depth).
    DefVmEx = 0x07,
    /// Clear the callback stack, ending installation (spec.md §9 decision).
    Exit = 0x08,
    /// Push the current ip as an address onto globals, then skip `size` bytes.
    DefFun = 0x09,
    /// Push a 4-byte IEEE-754 float constant onto globals.
    Def = 0x0A,
    /// `DEF_TUP n`: read `n` inline floats, build a tuple, push onto globals.
    DefTup = 0x0B,
    /// `DEF_VEC n v`: read one inline float `v`, push a tuple of `n` copies onto globals.
    DefVec = 0x0C,
    /// `DEF_NUM_VEC n`: push a tuple of `n` zeros onto globals.
    DefNumVec = 0x0D,

    // === Literals (0x10-0x2F) ===
    /// Push an immediate byte as a number.
    Lit8 = 0x10,
    /// Push an immediate big-endian u16 as a number.
    Lit16 = 0x11,
    /// Push a VLQ-encoded immediate as a number.
    Lit = 0x12,
    /// Push a 4-byte IEEE-754 float immediate.
    LitFlo = 0x13,
    /// Push +infinity.
    Inf = 0x14,
    /// Push -infinity.
    NegInf = 0x15,
    /// Fused small-immediate literals `LIT_N<k>` for k = 0..=8.
    LitN0 = 0x16,
    LitN1 = 0x17,
    LitN2 = 0x18,
    LitN3 = 0x19,
    LitN4 = 0x1A,
    LitN5 = 0x1B,
    LitN6 = 0x1C,
    LitN7 = 0x1D,
    LitN8 = 0x1E,

    // === Environment (0x30-0x3F) ===
    /// `LET n`: move the top `n` execution-stack slots onto the environment
    /// stack, preserving order.
    Let = 0x30,
    /// `POP_LET n`: drop `n` from the environment stack.
    PopLet = 0x31,
    /// `REF k`: push `environment[size-1-k]`.
    Ref = 0x32,
    /// Fused small-immediate `LET_N<n>` for n = 0..=4.
    LetN0 = 0x33,
    LetN1 = 0x34,
    LetN2 = 0x35,
    LetN3 = 0x36,
    LetN4 = 0x37,
    /// Fused small-immediate `REF_N<k>` for k = 0..=4.
    RefN0 = 0x38,
    RefN1 = 0x39,
    RefN2 = 0x3A,
    RefN3 = 0x3B,
    RefN4 = 0x3C,

    // === Globals (0x40-0x4F) ===
    /// `GLO_REF i`: push `globals[i]` (VLQ index).
    GloRef = 0x40,
    /// `GLO_REF16 i`: push `globals[i]` (big-endian u16 index).
    GloRef16 = 0x41,
    /// Fused small-immediate `GLO_REF_N<i>` for i = 0..=4.
    GloRefN0 = 0x42,
    GloRefN1 = 0x43,
    GloRefN2 = 0x44,
    GloRefN3 = 0x45,
    GloRefN4 = 0x46,

    // === Arithmetic & comparison (0x50-0x6F) ===
    Add = 0x50,
    Sub = 0x51,
    Mul = 0x52,
    Div = 0x53,
    Mod = 0x54,
    Rem = 0x55,
    Dot = 0x56,
    Abs = 0x57,
    Max = 0x58,
    Min = 0x59,
    Eq = 0x5A,
    Neq = 0x5B,
    Lt = 0x5C,
    Lte = 0x5D,
    Gt = 0x5E,
    Gte = 0x5F,
    Not = 0x60,
    Rnd = 0x61,
    /// Opaque delegation to the platform math library (spec.md §1).
    Sin = 0x62,
    Cos = 0x63,
    Tan = 0x64,
    Asin = 0x65,
    Acos = 0x66,
    Atan = 0x67,
    Atan2 = 0x68,
    Log = 0x69,
    Log10 = 0x6A,
    Exp = 0x6B,
    Pow = 0x6C,
    Sqrt = 0x6D,

    // === Tuples (0x70-0x7F) ===
    /// Push an empty tuple.
    NulTup = 0x70,
    /// `FAB_TUP n`: pop `n` values, push them as a tuple in original order.
    FabTup = 0x71,
    /// `FAB_VEC n`: pop one value, push a tuple of `n` copies of it.
    FabVec = 0x72,
    /// `FAB_NUM_VEC n`: push a tuple of `n` zeros.
    FabNumVec = 0x73,
    /// Pop index, pop tuple, push `tuple[index]`.
    Elt = 0x74,
    /// Push 1 if operand is a number, else the tuple's size.
    Len = 0x75,

    // === Feedback (0x80-0x8F) ===
    /// `INIT_FEEDBACK i`: initialize-or-read state cell `i`.
    InitFeedback = 0x80,
    /// `SET_FEEDBACK i`: write top of stack into state cell `i` without popping.
    SetFeedback = 0x81,
    /// `FEEDBACK i` (deprecated MIT form).
    Feedback = 0x82,

    // === Special forms (0x90-0x9F) ===
    Apply = 0x90,
    TupMap = 0x91,
    Fold = 0x92,
    /// `VFOLD idx` (MIT-deprecated, extra index byte preserved and ignored).
    VFold = 0x93,
    /// `MAP idx` (MIT-deprecated, alias of `TUP_MAP` with index byte ignored).
    Map = 0x94,
    /// `TUP idx` (MIT-deprecated, alias of `FAB_TUP` with index byte ignored).
    Tup = 0x95,

    // === Threads (0xA0-0xAF) ===
    Activate = 0xA0,
    Deactivate = 0xA1,
    Trigger = 0xA2,
    Result = 0xA3,
    Dt = 0xA4,
    SetDt = 0xA5,
    /// Ctrl-c-trigger extension (spec.md §5).
    CtrlCTrigger = 0xA6,

    // === Hood (0xB0-0xBF) ===
    Mid = 0xB0,
    FoldHood = 0xB1,
    FoldHoodPlus = 0xB2,
    /// `VFOLD_HOOD i idx` (MIT-deprecated; the globals write-back is dropped
    /// per DESIGN.md's open-question resolution).
    VFoldHood = 0xB3,
    VFoldHoodPlus = 0xB4,

    // === Control flow, wide forms (0xC0-0xCF) ===
    /// `IF16 n`: like `IF` with a big-endian u16 skip distance.
    If16 = 0xC0,
    /// `JMP16 n`: like `JMP` with a big-endian u16 skip distance.
    Jmp16 = 0xC1,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match byte {
            0x00 => Nop,
            0x01 => Ret,
            0x02 => All,
            0x03 => Mux,
            0x04 => VMux,
            0x05 => If,
            0x06 => Jmp,
            0x07 => DefVmEx,
            0x08 => Exit,
            0x09 => DefFun,
            0x0A => Def,
            0x0B => DefTup,
            0x0C => DefVec,
            0x0D => DefNumVec,
            0x10 => Lit8,
            0x11 => Lit16,
            0x12 => Lit,
            0x13 => LitFlo,
            0x14 => Inf,
            0x15 => NegInf,
            0x16 => LitN0,
            0x17 => LitN1,
            0x18 => LitN2,
            0x19 => LitN3,
            0x1A => LitN4,
            0x1B => LitN5,
            0x1C => LitN6,
            0x1D => LitN7,
            0x1E => LitN8,
            0x30 => Let,
            0x31 => PopLet,
            0x32 => Ref,
            0x33 => LetN0,
            0x34 => LetN1,
            0x35 => LetN2,
            0x36 => LetN3,
            0x37 => LetN4,
            0x38 => RefN0,
            0x39 => RefN1,
            0x3A => RefN2,
            0x3B => RefN3,
            0x3C => RefN4,
            0x40 => GloRef,
            0x41 => GloRef16,
            0x42 => GloRefN0,
            0x43 => GloRefN1,
            0x44 => GloRefN2,
            0x45 => GloRefN3,
            0x46 => GloRefN4,
            0x50 => Add,
            0x51 => Sub,
            0x52 => Mul,
            0x53 => Div,
            0x54 => Mod,
            0x55 => Rem,
            0x56 => Dot,
            0x57 => Abs,
            0x58 => Max,
            0x59 => Min,
            0x5A => Eq,
            0x5B => Neq,
            0x5C => Lt,
            0x5D => Lte,
            0x5E => Gt,
            0x5F => Gte,
            0x60 => Not,
            0x61 => Rnd,
            0x62 => Sin,
            0x63 => Cos,
            0x64 => Tan,
            0x65 => Asin,
            0x66 => Acos,
            0x67 => Atan,
            0x68 => Atan2,
            0x69 => Log,
            0x6A => Log10,
            0x6B => Exp,
            0x6C => Pow,
            0x6D => Sqrt,
            0x70 => NulTup,
            0x71 => FabTup,
            0x72 => FabVec,
            0x73 => FabNumVec,
            0x74 => Elt,
            0x75 => Len,
            0x80 => InitFeedback,
            0x81 => SetFeedback,
            0x82 => Feedback,
            0x90 => Apply,
            0x91 => TupMap,
            0x92 => Fold,
            0x93 => VFold,
            0x94 => Map,
            0x95 => Tup,
            0xA0 => Activate,
            0xA1 => Deactivate,
            0xA2 => Trigger,
            0xA3 => Result,
            0xA4 => Dt,
            0xA5 => SetDt,
            0xA6 => CtrlCTrigger,
            0xB0 => Mid,
            0xB1 => FoldHood,
            0xB2 => FoldHoodPlus,
            0xB3 => VFoldHood,
            0xB4 => VFoldHoodPlus,
            0xC0 => If16,
            0xC1 => Jmp16,
            _ => return None,
        })
    }

    /// `k` for a fused `LIT_N<k>` opcode, if this is one.
    pub fn lit_n(self) -> Option<f32> {
        use Opcode::*;
        let k = match self {
            LitN0 => 0,
            LitN1 => 1,
            LitN2 => 2,
            LitN3 => 3,
            LitN4 => 4,
            LitN5 => 5,
            LitN6 => 6,
            LitN7 => 7,
            LitN8 => 8,
            _ => return None,
        };
        Some(k as f32)
    }

    /// `n` for a fused `LET_N<n>` opcode, if this is one.
    pub fn let_n(self) -> Option<usize> {
        use Opcode::*;
        Some(match self {
            LetN0 => 0,
            LetN1 => 1,
            LetN2 => 2,
            LetN3 => 3,
            LetN4 => 4,
            _ => return None,
        })
    }

    /// `k` for a fused `REF_N<k>` opcode, if this is one.
    pub fn ref_n(self) -> Option<usize> {
        use Opcode::*;
        Some(match self {
            RefN0 => 0,
            RefN1 => 1,
            RefN2 => 2,
            RefN3 => 3,
            RefN4 => 4,
            _ => return None,
        })
    }

    /// `i` for a fused `GLO_REF_N<i>` opcode, if this is one.
    pub fn glo_ref_n(self) -> Option<usize> {
        use Opcode::*;
        Some(match self {
            GloRefN0 => 0,
            GloRefN1 => 1,
            GloRefN2 => 2,
            GloRefN3 => 3,
            GloRefN4 => 4,
            _ => return None,
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declared_byte_round_trips() {
        let bytes = [
            0x00u8, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D,
            0x1E, 0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C,
            0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x50, 0x51, 0x52, 0x53, 0x54, 0x55, 0x56,
            0x57, 0x58, 0x59, 0x5A, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F, 0x60, 0x61, 0x62, 0x63, 0x64,
            0x65, 0x66, 0x67, 0x68, 0x69, 0x6A, 0x6B, 0x6C, 0x6D, 0x70, 0x71, 0x72, 0x73, 0x74,
            0x75, 0x80, 0x81, 0x82, 0x90, 0x91, 0x92, 0x93, 0x94, 0x95, 0xA0, 0xA1, 0xA2, 0xA3,
            0xA4, 0xA5, 0xA6, 0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xC0, 0xC1,
        ];
        for b in bytes {
            assert!(Opcode::from_byte(b).is_some(), "opcode byte {b:#04x} did not decode");
        }
    }

    #[test]
    fn unknown_opcode_is_none() {
        assert!(Opcode::from_byte(0xFF).is_none());
    }
}
