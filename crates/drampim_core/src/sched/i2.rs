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

    sched/i2.rs

    Slowdown-bounded policy: a single PIM batch sets the per-bank MEM budget;
    once any bank spends its budget the channel returns to PIM.

*/

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
};

pub struct I2 {
    core: SchedulerCore,
    meter: SlowdownMeter,
}

impl I2 {
    pub fn new(cfg: &MemoryConfig) -> I2 {
        I2 {
            core: SchedulerCore::new(cfg),
            meter: SlowdownMeter::new(cfg.nbk),
        }
    }
}

impl SchedulerPolicy for I2 {
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
                self.meter.pim_batch_dur = ctx.cycle - self.meter.pim_batch_start;
                let dur = self.meter.pim_batch_dur;
                self.meter.derive_mem_budgets(ctx.cfg, dur);
            }

            if have_reads || have_writes {
                self.meter.reset_mem_phase();

                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("i2: switching to non-PIM mode");
            }
        }
        else if have_pim && (self.meter.budget_exceeded() || !(have_reads || have_writes)) {
            *ctx.mode = MemoryMode::Pim;
            ctx.stats.nonpim_to_pim_switches += 1;
            log::debug!("i2: switching to PIM mode");
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
}
