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

    sched/rr_mem.rs

    Request-count round-robin: after `frfcfs_cap` MEM requests the channel
    cedes to PIM for a derived number of PIM requests, rounded up to the PIM
    issue granularity and scaled by the slowdown bound.

*/

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    request::ReqId,
    sched::{
        core::{MissPick, SchedulerCore},
        SchedCtx,
        SchedulerPolicy,
    },
};

pub const RR_MEM_PIM_GRANULARITY: u64 = 16;

pub struct RrMem {
    core: SchedulerCore,

    num_pim_executed: u64,
    pim_cap: u64,
    num_mem_executed: u64,
}

impl RrMem {
    pub fn new(cfg: &MemoryConfig) -> RrMem {
        RrMem {
            core: SchedulerCore::new(cfg),
            num_pim_executed: 0,
            pim_cap: 0,
            num_mem_executed: 0,
        }
    }
}

impl SchedulerPolicy for RrMem {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn update_mode(&mut self, ctx: &mut SchedCtx) {
        let have_reads = self.core.have_queued_reads();
        let have_writes = self.core.have_queued_writes(ctx.cfg);
        let have_mem = have_reads || have_writes;
        let have_pim = !self.core.pim_queue.is_empty();

        if *ctx.mode == MemoryMode::Pim {
            if have_mem && (self.num_pim_executed > self.pim_cap || !have_pim) {
                self.num_pim_executed = 0;
                self.pim_cap = 0;

                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("rr_mem: switching to MEM mode");
            }
        }
        else if have_pim && (self.num_mem_executed > ctx.cfg.frfcfs_cap as u64 || !have_mem) {
            // The PIM phase gets the lesser of the executed MEM count and
            // the cap, rounded up to the issue granularity and scaled by the
            // slowdown bound.
            self.pim_cap = self.num_mem_executed.min(ctx.cfg.frfcfs_cap as u64);
            self.pim_cap = self.pim_cap.div_ceil(RR_MEM_PIM_GRANULARITY) * RR_MEM_PIM_GRANULARITY;
            self.pim_cap *= ctx.cfg.max_pim_slowdown as u64;

            self.num_mem_executed = 0;

            *ctx.mode = MemoryMode::Pim;
            ctx.stats.nonpim_to_pim_switches += 1;
            log::debug!("rr_mem: switching to PIM mode");
        }

        self.core.update_rw_mode(ctx);
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule(bank, curr_row, MissPick::OldestAny, ctx);

        if rid.is_some() {
            self.num_mem_executed += 1;
        }

        rid
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule_pim(ctx)?;
        self.num_pim_executed += 1;
        Some(rid)
    }
}
