/*
    DramPIM
    https://github.com/dbalsom/drampim

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    sched/i3.rs

    I2 with a minimum PIM batch count: the channel stays in PIM mode until at
    least `min_pim_batches` batches have completed, accumulating their
    durations into the MEM budget derivation.

*/

use std::fmt::Write;

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    request::ReqId,
    sched::{
        batch::SlowdownMeter,
        core::{MissPick, SchedulerCore},
        SchedCtx,
        SchedulerPolicy,
    },
    stats::Series,
};

pub struct I3 {
    core: SchedulerCore,
    meter: SlowdownMeter,

    finished_batches: u32,
    pim_batch_exec_time: Series,
    prev_pim_num: u64,
}

impl I3 {
    pub fn new(cfg: &MemoryConfig) -> I3 {
        I3 {
            core: SchedulerCore::new(cfg),
            meter: SlowdownMeter::new(cfg.nbk),
            finished_batches: 0,
            pim_batch_exec_time: Series::default(),
            prev_pim_num: 0,
        }
    }
}

impl SchedulerPolicy for I3 {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn update_mode(&mut self, ctx: &mut SchedCtx) {
        let have_reads = self.core.have_queued_reads();
        let have_writes = self.core.have_queued_writes(ctx.cfg);
        let have_pim = !self.core.pim_queue.is_empty();
        let next_pim_row = self.core.pim_oldest().map(|rid| ctx.arena.get(rid).row);

        if *ctx.mode == MemoryMode::Pim {
            if self.meter.batch_over(next_pim_row) {
                let batch_exec_time = ctx.cycle - self.meter.pim_batch_start;
                self.meter.pim_batch_dur += batch_exec_time;
                self.pim_batch_exec_time.push(batch_exec_time);

                log::debug!(
                    "i3: batch over ({}); exec_time={} size={}",
                    if have_pim { "row conflict" } else { "no more requests" },
                    batch_exec_time,
                    ctx.stats.pim_num - self.prev_pim_num
                );
                self.prev_pim_num = ctx.stats.pim_num;

                let dur = self.meter.pim_batch_dur;
                self.meter.derive_mem_budgets(ctx.cfg, dur);

                self.finished_batches += 1;
                self.meter.pim_batch_start = 0;
            }

            if (self.finished_batches >= ctx.cfg.min_pim_batches || !have_pim) && (have_reads || have_writes) {
                self.meter.reset_mem_phase();
                self.meter.pim_batch_dur = 0;
                self.finished_batches = 0;

                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("i3: switching to non-PIM mode");
            }
        }
        else if have_pim && (self.meter.budget_exceeded() || !(have_reads || have_writes)) {
            *ctx.mode = MemoryMode::Pim;
            ctx.stats.nonpim_to_pim_switches += 1;
            log::debug!("i3: switching to PIM mode");
        }

        self.core.update_rw_mode(ctx);
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule(bank, curr_row, MissPick::OldestAny, ctx);
        self.meter.on_mem_schedule(bank, rid.is_some(), ctx.cycle);
        rid
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule_pim(ctx)?;
        self.meter.on_pim_schedule(ctx.arena.get(rid).row, ctx.cycle);
        Some(rid)
    }

    fn extended_stats(&self, _cfg: &MemoryConfig) -> Option<String> {
        let mut out = String::new();
        let _ = writeln!(out, "AvgPimBatchExecTime = {:.6}", self.pim_batch_exec_time.mean());
        let _ = writeln!(out, "MaxPimBatchExecTime = {}", self.pim_batch_exec_time.max);
        let _ = writeln!(out, "StDevPimBatchExecTime = {:.6}", self.pim_batch_exec_time.stdev());
        Some(out)
    }
}
