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

    sched/i3_timer.rs

    Timer variant of I3: instead of a per-bank MEM request budget, each
    finished PIM batch arms a deadline one batch-duration ahead; the channel
    returns to PIM when the deadline passes.

*/

use std::fmt::Write;

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    request::ReqId,
    sched::{core::SchedulerCore, SchedCtx, SchedulerPolicy},
    stats::Series,
};

pub struct I3Timer {
    core: SchedulerCore,

    nonpim_to_pim_switch_cycle: u64,

    last_pim_row: Option<u32>,
    pim_batch_start: u64,
    pim_batch_dur: u64,

    finished_batches: u32,
    prev_pim_num: u64,

    pim_batch_exec_time: Series,
    mem_batch_exec_time: Series,
    mem_batch_start: u64,
}

impl I3Timer {
    pub fn new(cfg: &MemoryConfig) -> I3Timer {
        I3Timer {
            core: SchedulerCore::new(cfg),
            nonpim_to_pim_switch_cycle: 0,
            last_pim_row: None,
            pim_batch_start: 0,
            pim_batch_dur: 0,
            finished_batches: 0,
            prev_pim_num: 0,
            pim_batch_exec_time: Series::default(),
            mem_batch_exec_time: Series::default(),
            mem_batch_start: 0,
        }
    }
}

impl SchedulerPolicy for I3Timer {
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
            let batch_over = self.pim_batch_start > 0
                && match next_pim_row {
                    None => true,
                    Some(row) => self.last_pim_row != Some(row),
                };

            if batch_over {
                let batch_exec_time = ctx.cycle - self.pim_batch_start;
                self.pim_batch_start = 0;
                self.pim_batch_dur += batch_exec_time;
                self.pim_batch_exec_time.push(batch_exec_time);

                log::debug!(
                    "i3_timer: batch over; exec_time={} size={}",
                    batch_exec_time,
                    ctx.stats.pim_num - self.prev_pim_num
                );

                self.finished_batches += 1;
                self.prev_pim_num = ctx.stats.pim_num;

                // Arm the comeback deadline one accumulated batch length out.
                self.nonpim_to_pim_switch_cycle = ctx.cycle + self.pim_batch_dur;
            }

            if (self.finished_batches >= ctx.cfg.min_pim_batches || !have_pim) && (have_reads || have_writes) {
                self.pim_batch_dur = 0;
                self.finished_batches = 0;

                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                self.mem_batch_start = ctx.cycle;
                log::debug!("i3_timer: switching to non-PIM mode");
            }
        }
        else if have_pim && (ctx.cycle > self.nonpim_to_pim_switch_cycle || !(have_reads || have_writes)) {
            *ctx.mode = MemoryMode::Pim;
            ctx.stats.nonpim_to_pim_switches += 1;
            if self.mem_batch_start > 0 {
                self.mem_batch_exec_time.push(ctx.cycle - self.mem_batch_start);
                self.mem_batch_start = 0;
            }
            log::debug!("i3_timer: switching to PIM mode");
        }

        self.core.update_rw_mode(ctx);
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule_pim(ctx)?;

        if self.pim_batch_start == 0 {
            self.pim_batch_start = ctx.cycle;
        }
        self.last_pim_row = Some(ctx.arena.get(rid).row);

        Some(rid)
    }

    fn extended_stats(&self, _cfg: &MemoryConfig) -> Option<String> {
        let mut out = String::new();
        let _ = writeln!(out, "AvgPimBatchExecTime = {:.6}", self.pim_batch_exec_time.mean());
        let _ = writeln!(out, "MaxPimBatchExecTime = {}", self.pim_batch_exec_time.max);
        let _ = writeln!(out, "StDevPimBatchExecTime = {:.6}", self.pim_batch_exec_time.stdev());
        let batches = self.pim_batch_exec_time.n;
        let _ = writeln!(
            out,
            "AvgPimBatchSize = {:.6}",
            if batches > 0 {
                self.prev_pim_num as f64 / batches as f64
            }
            else {
                0.0
            }
        );
        let _ = writeln!(out, "AvgMemBatchExecTime = {:.6}", self.mem_batch_exec_time.mean());
        let _ = writeln!(out, "MaxMemBatchExecTime = {}", self.mem_batch_exec_time.max);
        let _ = writeln!(out, "StDevMemBatchExecTime = {:.6}", self.mem_batch_exec_time.stdev());
        Some(out)
    }
}
