//! Neighborhood aggregation: `MID`, `FOLD_HOOD`, `FOLD_HOOD_PLUS`, and the
//! deprecated MIT `VFOLD_HOOD`/`VFOLD_HOOD_PLUS` forms.
//!
//! Grounded on `original_source/vm/src/vm/instructions/hood.cpp` and
//! `neighborhood.rs` for the self-at-slot-0 / insertion-order contract.
//! `FOLD_HOOD` always fuses self first (its export was just written into
//! `imports[channel]`, so the first call and every later one share the same
//! code path); `FOLD_HOOD_PLUS` threads an extra filter stage per neighbor
//! before fusing, per spec.md §4.6.

use tracing::trace;

use crate::error::VmResult;
use crate::host::Platform;
use crate::machine::{Continuation, FoldHoodPlusStage};
use crate::value::Value;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    pub(crate) fn op_mid(&mut self) -> VmResult<()> {
        let id = self.hood.self_neighbor().id;
        self.exec.push(Value::Number(id as f32))
    }

    pub(crate) fn op_fold_hood(&mut self) -> VmResult<()> {
        let channel = self.read_vlq()? as usize;
        self.fold_hood_body(channel)
    }

    fn fold_hood_body(&mut self, channel: usize) -> VmResult<()> {
        let export_value = self.exec.pop()?;
        let start_value = self.exec.pop()?;
        let fuse = self.pop_address()?;
        self.hood.self_neighbor_mut().imports[channel] = export_value.clone();
        self.env.push(start_value)?;
        self.env.push(export_value)?;
        self.call(fuse, Some(Continuation::FoldHood { channel, func: fuse, neighbor_index: 0 }))
    }

    pub(crate) fn resume_fold_hood(
        &mut self,
        channel: usize,
        func: usize,
        neighbor_index: usize,
        _r: Value,
    ) -> VmResult<()> {
        self.env.popn(2)?;
        let running = self.exec.pop()?;
        match self.next_import(channel, neighbor_index)? {
            Some(j) => {
                trace!(target: "delftproto::hood", channel, neighbor = j, "fold_hood step");
                let imp = self.hood.get(j)?.imports[channel].clone();
                self.env.push(running)?;
                self.env.push(imp)?;
                self.call(func, Some(Continuation::FoldHood { channel, func, neighbor_index: j }))
            }
            None => {
                trace!(target: "delftproto::hood", channel, "fold_hood done");
                self.exec.push(running)
            }
        }
    }

    pub(crate) fn op_fold_hood_plus(&mut self) -> VmResult<()> {
        let channel = self.read_vlq()? as usize;
        self.fold_hood_plus_body(channel)
    }

    fn fold_hood_plus_body(&mut self, channel: usize) -> VmResult<()> {
        let export_value = self.exec.pop()?;
        let filter = self.pop_address()?;
        let fuse = self.pop_address()?;
        self.hood.self_neighbor_mut().imports[channel] = export_value.clone();
        self.env.push(export_value)?;
        self.call(
            filter,
            Some(Continuation::FoldHoodPlus { channel, fuse, filter, stage: FoldHoodPlusStage::FilterFirst }),
        )
    }

    pub(crate) fn resume_fold_hood_plus(
        &mut self,
        channel: usize,
        fuse: usize,
        filter: usize,
        stage: FoldHoodPlusStage,
        _r: Value,
    ) -> VmResult<()> {
        match stage {
            FoldHoodPlusStage::FilterFirst => {
                self.env.popn(1)?;
                let running = self.exec.pop()?;
                self.advance_fold_hood_plus_filter(channel, fuse, filter, running, 0)
            }
            FoldHoodPlusStage::FilterStep { running, neighbor } => {
                self.env.popn(1)?;
                let filtered = self.exec.pop()?;
                self.env.push(running)?;
                self.env.push(filtered)?;
                self.call(fuse, Some(Continuation::FoldHoodPlus { channel, fuse, filter, stage: FoldHoodPlusStage::FuseStep { neighbor } }))
            }
            FoldHoodPlusStage::FuseStep { neighbor } => {
                self.env.popn(2)?;
                let running = self.exec.pop()?;
                self.advance_fold_hood_plus_filter(channel, fuse, filter, running, neighbor)
            }
        }
    }

    fn advance_fold_hood_plus_filter(
        &mut self,
        channel: usize,
        fuse: usize,
        filter: usize,
        running: Value,
        after: usize,
    ) -> VmResult<()> {
        match self.next_import(channel, after)? {
            Some(j) => {
                trace!(target: "delftproto::hood", channel, neighbor = j, "fold_hood_plus filter step");
                let imp = self.hood.get(j)?.imports[channel].clone();
                self.env.push(imp)?;
                self.call(
                    filter,
                    Some(Continuation::FoldHoodPlus {
                        channel,
                        fuse,
                        filter,
                        stage: FoldHoodPlusStage::FilterStep { running, neighbor: j },
                    }),
                )
            }
            None => {
                trace!(target: "delftproto::hood", channel, "fold_hood_plus done");
                self.exec.push(running)
            }
        }
    }

    /// `VFOLD_HOOD idx i` (deprecated): the MIT dialect additionally wrote
    /// the result back into `globals[idx]`. Per DESIGN.md's open-question
    /// resolution that write-back is dropped, but the operand shape must
    /// still match the wire format: `idx` is a single discarded fixed-width
    /// byte read *before* `channel`, exactly like
    /// `original_source/vm/src/vm/instructions/hood.cpp`'s `VFOLD_HOOD`
    /// (`machine.nextInt8()` then `fold_hood`'s own `nextInt()`).
    pub(crate) fn op_vfold_hood(&mut self) -> VmResult<()> {
        let _idx = self.read_u8()?;
        let channel = self.read_vlq()? as usize;
        self.fold_hood_body(channel)
    }

    pub(crate) fn op_vfold_hood_plus(&mut self) -> VmResult<()> {
        let _idx = self.read_u8()?;
        let channel = self.read_vlq()? as usize;
        self.fold_hood_plus_body(channel)
    }

    /// First neighbor index `> after` whose `imports[channel]` is not
    /// `Undefined` (spec.md §4.6: neighbors that never imported on this
    /// channel are skipped).
    fn next_import(&self, channel: usize, after: usize) -> VmResult<Option<usize>> {
        for j in (after + 1)..self.hood.len() {
            if !matches!(self.hood.get(j)?.imports[channel], Value::Undefined) {
                return Ok(Some(j));
            }
        }
        Ok(None)
    }
}
