//! The machine (C7) and its opcode dispatch (C8).
//!
//! Grounded on `src/backend/bytecode/vm/mod.rs`'s `Vm` struct (the
//! stacks-plus-cursor shape and the `step()` big-match) and on
//! `original_source/vm/src/vm/machine.hpp` for the install/run contract.
//! `Continuation` is the one deliberate redesign spec.md §9 calls for:
//! the original's higher-order opcodes (`apply`, `tup_map`, `fold`,
//! `fold_hood(_plus)`) resume iteration through file-scoped globals; here
//! each one is a small enum variant carrying exactly the state its
//! resumption needs, pushed on the callback stack like any other
//! continuation.

mod instructions;

use tracing::trace;

use crate::error::{VmError, VmResult};
use crate::host::Platform;
use crate::neighborhood::{NodeId, Neighborhood};
use crate::opcodes::Opcode;
use crate::script::{Cursor, Script};
use crate::stacks::{CallbackStack, Globals, ValueStack};
use crate::state::StateTable;
use crate::thread_table::{Thread, ThreadId, ThreadTable, Time};
use crate::value::Value;

/// One step of iteration state for a higher-order instruction, resumed when
/// its inner function call returns (spec.md §4.3, §4.6).
#[derive(Debug)]
pub enum Continuation {
    /// Installed by `run()` around a thread's entry-point call; records the
    /// thread whose result and GC bookkeeping this return completes.
    RunCallback { thread: ThreadId },
    /// `INIT_FEEDBACK i`'s initializer call.
    InitFeedback { cell: usize },
    /// `APPLY`'s single call; `arg_count` environment slots to drop.
    Apply { arg_count: usize },
    /// `TUP_MAP`: fuse-in-place traversal of `source`, building `result`.
    TupMap { func: usize, source: Value, result: Value, index: usize },
    /// `FOLD`: left-to-right traversal of `source`, accumulator threaded via
    /// the execution stack (each return already leaves it on top).
    Fold { func: usize, source: Value, index: usize },
    /// `FOLD_HOOD i`: neighbor traversal, self already fused before the
    /// continuation is ever invoked.
    FoldHood { channel: usize, func: usize, neighbor_index: usize },
    /// `FOLD_HOOD_PLUS i`: two-phase filter/fuse traversal.
    FoldHoodPlus { channel: usize, fuse: usize, filter: usize, stage: FoldHoodPlusStage },
}

#[derive(Debug)]
pub enum FoldHoodPlusStage {
    /// Waiting for `filter(self_export)` to return.
    FilterFirst,
    /// Waiting for `filter(neighbor_import)` to return; `running` is the
    /// accumulator so far.
    FilterStep { running: Value, neighbor: usize },
    /// Waiting for `fuse(running, filtered)` to return.
    FuseStep { neighbor: usize },
}

/// Owns every piece of per-node VM state (spec.md §3): the four stacks, the
/// globals table, the state and thread tables, the neighborhood, and the
/// installed script plus instruction pointer.
pub struct Machine<P: Platform> {
    script: Script,
    ip: usize,
    exec: ValueStack,
    env: ValueStack,
    globals: Globals,
    callbacks: CallbackStack,
    state: StateTable,
    threads: ThreadTable,
    hood: Neighborhood,
    current_thread: ThreadId,
    start_time: Time,
    max_call_depth: usize,
    platform: P,
}

const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Bytes at or above this value have no assigned core instruction and are
/// reserved for the platform's own opcode extension (spec.md §1's "opcode
/// table extension for platform I/O"); a `None` decode below it is a
/// genuine invalid opcode rather than an I/O hook (spec.md §7's
/// *ProgrammerBug* "bad opcode in strict builds").
const PLATFORM_OPCODE_RANGE_START: u8 = 0xD0;

/// Ceiling on a single tuple/vector allocation (`FAB_VEC`, `FAB_NUM_VEC`,
/// `DEF_TUP`, `DEF_VEC`, `DEF_NUM_VEC`): the element count is read straight
/// off the wire as a VLQ, so an unbounded `vec![_; n]` is the tuple
/// allocator's out-of-memory case from spec.md §7 (*ResourceExhaustion*).
pub(crate) const MAX_TUPLE_ELEMENTS: usize = 1 << 20;

impl<P: Platform> Machine<P> {
    pub fn new(node_id: NodeId, platform: P) -> Self {
        Self::with_max_call_depth(node_id, platform, DEFAULT_MAX_CALL_DEPTH)
    }

    /// As [`Machine::new`], but seeds the call-depth limit from the host's
    /// own configuration (`HostConfig::initial_max_call_depth`) rather than
    /// the built-in default. A script's own `DEF_VM_EX` prologue still
    /// overrides this once installed.
    pub fn with_max_call_depth(node_id: NodeId, platform: P, max_call_depth: usize) -> Self {
        let mut hood = Neighborhood::new();
        hood.reset(node_id, 0);
        Machine {
            script: Script::new(Vec::new()),
            ip: 0,
            exec: ValueStack::new(0),
            env: ValueStack::new(0),
            globals: Globals::new(0),
            callbacks: Vec::new(),
            state: StateTable::new(0),
            threads: ThreadTable::new(0),
            hood,
            current_thread: ThreadId(0),
            start_time: 0.0,
            max_call_depth,
            platform,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn neighborhood(&self) -> &Neighborhood {
        &self.hood
    }

    pub fn neighborhood_mut(&mut self) -> &mut Neighborhood {
        &mut self.hood
    }

    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    /// Deliver an out-of-band ctrl-c-style host signal to `thread` (spec.md
    /// §5's `CTRL_C_TRIGGER` extension). `thread` must have been armed by a
    /// `CTRL_C_TRIGGER` instruction (`ctrl_c_triggered == true`); this
    /// disarms it and marks it pending, mirroring
    /// `original_source/vm/src/vm-extensions/ctrl-c-trigger/instructions.cpp`'s
    /// signal handler calling `trigger()`. Delivering to a thread that is
    /// not currently armed — i.e. a second signal before the bytecode
    /// re-arms it with another `CTRL_C_TRIGGER` — is the "hitting the
    /// signal twice aborts" case and returns [`VmError::DoubleSignal`].
    pub fn deliver_ctrl_c(&mut self, thread: ThreadId) -> VmResult<()> {
        let t = self.threads.get_mut(thread)?;
        if !t.ctrl_c_triggered {
            return Err(VmError::DoubleSignal);
        }
        t.ctrl_c_triggered = false;
        t.triggered = true;
        Ok(())
    }

    /// Install a new script: reset the instruction pointer to its start and
    /// push the sentinel continuation (spec.md §4.4). The caller drives
    /// `step()` until [`Machine::finished`] to run the install-time
    /// `DEF_*`/`EXIT` prologue.
    pub fn install(&mut self, script: Script) {
        self.script = script;
        self.ip = 0;
        self.current_thread = ThreadId(0);
        self.callbacks.clear();
        self.callbacks.push(None);
    }

    /// True once the callback stack is empty — either install finished via
    /// `EXIT`, or the current round's thread has fully returned (spec.md §8,
    /// invariant S1).
    pub fn finished(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// True when the execution and environment stacks are both empty. Holds
    /// whenever [`Machine::finished`] does (spec.md §8's quantified
    /// invariant: both stacks are empty at `finished()` except for
    /// thread-result scaffolding, which never touches these two stacks).
    pub fn stacks_idle(&self) -> bool {
        self.exec.is_empty() && self.env.is_empty()
    }

    /// Begin one round at time `now` (spec.md §4.5): select the next
    /// pending thread round-robin from `current_thread`, untrigger it, jump
    /// to its entry point, and arm `run_callback`. A no-op if no thread is
    /// pending.
    pub fn run(&mut self, now: Time) -> VmResult<()> {
        self.start_time = now;
        match self.threads.next_pending(self.current_thread) {
            Some(thread_id) => {
                self.threads.get_mut(thread_id)?.triggered = false;
                self.current_thread = thread_id;
                let entry = self.thread_entry(thread_id)?;
                self.ip = entry;
                self.callbacks.push(Some(Continuation::RunCallback { thread: thread_id }));
                trace!(target: "delftproto::machine", thread = thread_id.0, now, "round start");
            }
            None => trace!(target: "delftproto::machine", now, "round start: no thread pending"),
        }
        Ok(())
    }

    /// Execute exactly one instruction.
    pub fn step(&mut self) -> VmResult<()> {
        if self.finished() {
            return Err(VmError::AlreadyFinished);
        }
        let at = self.ip;
        let byte = self.read_u8()?;
        let opcode = match Opcode::from_byte(byte) {
            Some(op) => op,
            None if byte >= PLATFORM_OPCODE_RANGE_START => return self.platform.unknown_opcode(byte),
            None => return Err(VmError::InvalidOpcode(byte)),
        };
        trace!(target: "delftproto::machine", ip = at, opcode = %opcode, "step");
        self.dispatch(opcode)
    }

    fn dispatch(&mut self, opcode: Opcode) -> VmResult<()> {
        use Opcode::*;
        match opcode {
            Nop => Ok(()),
            Ret => self.retn(),
            All => self.op_all(),
            Mux => self.op_mux(),
            VMux => self.op_vmux(),
            If => self.op_if(),
            Jmp => self.op_jmp(),
            If16 => self.op_if16(),
            Jmp16 => self.op_jmp16(),
            DefVmEx => self.op_def_vm_ex(),
            Exit => self.op_exit(),
            DefFun => self.op_def_fun(),
            Def => self.op_def(),
            DefTup => self.op_def_tup(),
            DefVec => self.op_def_vec(),
            DefNumVec => self.op_def_num_vec(),

            Lit8 => self.op_lit8(),
            Lit16 => self.op_lit16(),
            Lit => self.op_lit(),
            LitFlo => self.op_lit_flo(),
            Inf => self.exec.push(Value::Number(f32::INFINITY)),
            NegInf => self.exec.push(Value::Number(f32::NEG_INFINITY)),
            LitN0 | LitN1 | LitN2 | LitN3 | LitN4 | LitN5 | LitN6 | LitN7 | LitN8 => {
                let k = opcode.lit_n().expect("matched LitN* variant");
                self.exec.push(Value::Number(k))
            }

            Let => self.op_let(),
            PopLet => self.op_pop_let(),
            Ref => self.op_ref(),
            LetN0 | LetN1 | LetN2 | LetN3 | LetN4 => {
                let n = opcode.let_n().expect("matched LetN* variant");
                self.let_n(n)
            }
            RefN0 | RefN1 | RefN2 | RefN3 | RefN4 => {
                let k = opcode.ref_n().expect("matched RefN* variant");
                self.ref_k(k)
            }

            GloRef => self.op_glo_ref(),
            GloRef16 => self.op_glo_ref16(),
            GloRefN0 | GloRefN1 | GloRefN2 | GloRefN3 | GloRefN4 => {
                let i = opcode.glo_ref_n().expect("matched GloRefN* variant");
                self.glo_ref(i)
            }

            Add => self.binary_numeric(|a, b| a + b),
            Sub => self.binary_numeric(|a, b| a - b),
            Mul => self.binary_numeric(|a, b| a * b),
            Div => self.binary_numeric(|a, b| a / b),
            Mod => self.binary_numeric(|a, b| a.rem_euclid(b)),
            Rem => self.binary_numeric(|a, b| a % b),
            Dot => self.op_dot(),
            Abs => self.unary_numeric(f32::abs),
            Max => self.binary_numeric(f32::max),
            Min => self.binary_numeric(f32::min),
            Eq => self.op_eq(),
            Neq => self.op_neq(),
            Lt => self.op_compare(std::cmp::Ordering::is_lt),
            Lte => self.op_compare(std::cmp::Ordering::is_le),
            Gt => self.op_compare(std::cmp::Ordering::is_gt),
            Gte => self.op_compare(std::cmp::Ordering::is_ge),
            Not => self.op_not(),
            Rnd => self.op_rnd(),
            Sin => self.unary_numeric(f32::sin),
            Cos => self.unary_numeric(f32::cos),
            Tan => self.unary_numeric(f32::tan),
            Asin => self.unary_numeric(f32::asin),
            Acos => self.unary_numeric(f32::acos),
            Atan => self.unary_numeric(f32::atan),
            Atan2 => self.binary_numeric(f32::atan2),
            Log => self.unary_numeric(f32::ln),
            Log10 => self.unary_numeric(f32::log10),
            Exp => self.unary_numeric(f32::exp),
            Pow => self.binary_numeric(f32::powf),
            Sqrt => self.unary_numeric(f32::sqrt),

            NulTup => self.exec.push(Value::tuple(Vec::new())),
            FabTup => self.op_fab_tup(),
            FabVec => self.op_fab_vec(),
            FabNumVec => self.op_fab_num_vec(),
            Elt => self.op_elt(),
            Len => self.op_len(),

            InitFeedback => self.op_init_feedback(),
            SetFeedback => self.op_set_feedback(),
            Feedback => self.op_feedback(),

            Apply => self.op_apply(),
            TupMap => self.op_tup_map(),
            Fold => self.op_fold(),
            VFold => self.op_vfold(),
            Map => self.op_map(),
            Tup => self.op_tup(),

            Activate => self.op_activate(),
            Deactivate => self.op_deactivate(),
            Trigger => self.op_trigger(),
            Result => self.op_result(),
            Dt => self.op_dt(),
            SetDt => self.op_set_dt(),
            CtrlCTrigger => self.op_ctrl_c_trigger(),

            Mid => self.op_mid(),
            FoldHood => self.op_fold_hood(),
            FoldHoodPlus => self.op_fold_hood_plus(),
            VFoldHood => self.op_vfold_hood(),
            VFoldHoodPlus => self.op_vfold_hood_plus(),
        }
    }

    /// Call `target`: push `continuation`, push the current ip as a return
    /// address, and jump (spec.md §4.3). Every caller — ordinary or
    /// higher-order — goes through this one path.
    fn call(&mut self, target: usize, continuation: Option<Continuation>) -> VmResult<()> {
        if self.callbacks.len() >= self.max_call_depth {
            return Err(VmError::StackOverflow);
        }
        self.callbacks.push(continuation);
        debug_assert!(self.callbacks.len() <= self.max_call_depth, "call depth exceeds max_call_depth");
        self.exec.push(Value::Address(self.ip))?;
        self.jump_ip(target)
    }

    /// Return through the callback stack (spec.md §4.3). The instruction
    /// pointer left here is only observed when `cb` is `None`: any
    /// continuation that wants to keep iterating immediately overwrites it
    /// via its own `call()`.
    fn retn(&mut self) -> VmResult<()> {
        let cb = self.callbacks.pop().ok_or(VmError::CallStackUnderflow)?;
        let r = self.exec.pop()?;
        if !self.callbacks.is_empty() {
            let addr = self.pop_address()?;
            self.jump_ip(addr)?;
        }
        let top_level_end = self.callbacks.is_empty() && cb.is_none();
        debug_assert!(
            !top_level_end || self.exec.is_empty(),
            "exec stack must be empty when the sentinel continuation returns"
        );
        if !top_level_end {
            self.exec.push(r.clone())?;
        }
        if let Some(continuation) = cb {
            self.invoke_continuation(continuation, r)?;
        }
        Ok(())
    }

    fn pop_address(&mut self) -> VmResult<usize> {
        let v = self.exec.pop()?;
        v.as_address().ok_or(VmError::TypeError { expected: "address", got: v.type_name() })
    }

    fn invoke_continuation(&mut self, continuation: Continuation, r: Value) -> VmResult<()> {
        match continuation {
            Continuation::RunCallback { thread } => self.resume_run_callback(thread, r),
            Continuation::InitFeedback { cell } => self.resume_init_feedback(cell, r),
            Continuation::Apply { arg_count } => self.resume_apply(arg_count),
            Continuation::TupMap { func, source, result, index } => {
                self.resume_tup_map(func, source, result, index, r)
            }
            Continuation::Fold { func, source, index } => self.resume_fold(func, source, index, r),
            Continuation::FoldHood { channel, func, neighbor_index } => {
                self.resume_fold_hood(channel, func, neighbor_index, r)
            }
            Continuation::FoldHoodPlus { channel, fuse, filter, stage } => {
                self.resume_fold_hood_plus(channel, fuse, filter, stage, r)
            }
        }
    }

    fn resume_run_callback(&mut self, thread: ThreadId, r: Value) -> VmResult<()> {
        // `r` is already the value retn() pushed back onto exec; pull it off
        // again since a finished round leaves every stack empty.
        let _ = self.exec.pop()?;
        {
            let t: &mut Thread = self.threads.get_mut(thread)?;
            t.result = r;
            t.last_time = Some(self.start_time);
        }
        self.state.gc_thread(thread);
        let n = self.threads.len().max(1);
        self.current_thread = ThreadId((thread.0 + 1) % n);
        trace!(target: "delftproto::machine", thread = thread.0, "round end");
        Ok(())
    }

    /// Reject an element count too large to allocate, before any `vec![_; n]`
    /// is attempted (spec.md §7's tuple-allocator `ResourceExhaustion` case).
    pub(crate) fn check_tuple_alloc(&self, n: usize) -> VmResult<()> {
        if n > MAX_TUPLE_ELEMENTS {
            return Err(VmError::OutOfMemory);
        }
        Ok(())
    }

    fn thread_entry(&self, id: ThreadId) -> VmResult<usize> {
        let globals_len = self.globals.len();
        let idx = globals_len
            .checked_sub(1 + id.0)
            .ok_or(VmError::IndexOutOfBounds { index: id.0, len: globals_len })?;
        let v = self.globals.get(idx)?;
        v.as_address().ok_or(VmError::TypeError { expected: "address", got: v.type_name() })
    }

    fn read_u8(&mut self) -> VmResult<u8> {
        let mut cursor = Cursor::new(&self.script, self.ip);
        let b = cursor.next_u8()?;
        self.ip = cursor.ip();
        Ok(b)
    }

    fn read_u16(&mut self) -> VmResult<u16> {
        let mut cursor = Cursor::new(&self.script, self.ip);
        let v = cursor.next_u16()?;
        self.ip = cursor.ip();
        Ok(v)
    }

    fn read_f32(&mut self) -> VmResult<f32> {
        let mut cursor = Cursor::new(&self.script, self.ip);
        let v = cursor.next_f32()?;
        self.ip = cursor.ip();
        Ok(v)
    }

    fn read_vlq(&mut self) -> VmResult<u32> {
        let mut cursor = Cursor::new(&self.script, self.ip);
        let v = cursor.next_vlq()?;
        self.ip = cursor.ip();
        Ok(v)
    }

    fn jump_ip(&mut self, target: usize) -> VmResult<()> {
        let mut cursor = Cursor::new(&self.script, self.ip);
        cursor.jump(target)?;
        self.ip = cursor.ip();
        Ok(())
    }

    fn skip_ip(&mut self, n: usize) -> VmResult<()> {
        let mut cursor = Cursor::new(&self.script, self.ip);
        cursor.skip(n)?;
        self.ip = cursor.ip();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullPlatform;
    use crate::script::encode_vlq;

    fn vlq(n: u32) -> Vec<u8> {
        encode_vlq(n)
    }

    /// `DEF_VM_EX 4 4 4 1 0 0 32`, one `DEF_FUN` wrapping `2 3 ADD RET`,
    /// `EXIT`, then `ACTIVATE 0` is not reachable without a thread body
    /// already running — this just exercises install + a single round that
    /// computes `2 + 3`.
    #[test]
    fn installs_and_runs_addition_thread() {
        let mut bytes = vec![Opcode::DefVmEx as u8];
        for n in [4u32, 4, 4, 1, 0, 0, 32] {
            bytes.extend(vlq(n));
        }
        // DEF_FUN body: LIT_N2 LIT_N3 ADD RET
        let body = [
            Opcode::LitN2 as u8,
            Opcode::LitN3 as u8,
            Opcode::Add as u8,
            Opcode::Ret as u8,
        ];
        bytes.push(Opcode::DefFun as u8);
        bytes.extend(vlq(body.len() as u32));
        bytes.extend_from_slice(&body);
        bytes.push(Opcode::Exit as u8);

        let mut m = Machine::new(1, NullPlatform::default());
        m.install(Script::new(bytes));
        while !m.finished() {
            m.step().unwrap();
        }
        assert_eq!(m.globals.len(), 1);

        m.threads.get_mut(ThreadId(0)).unwrap().active = true;
        m.run(0.0).unwrap();
        while !m.finished() {
            m.step().unwrap();
        }
        let result = &m.threads.get(ThreadId(0)).unwrap().result;
        assert_eq!(result.as_number(), Some(5.0));
        assert_eq!(m.exec.len(), 0);
        assert_eq!(m.env.len(), 0);
    }
}
