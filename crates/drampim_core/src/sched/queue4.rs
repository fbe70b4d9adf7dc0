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

    sched/queue4.rs

    Queue3 with a MEM stall-time bound: cycles MEM spends waiting behind an
    open PIM batch count against a fixed budget that forces the switch even
    when the queues read as balanced.

*/

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    request::ReqId,
    sched::{core::SchedulerCore, SchedCtx, SchedulerPolicy},
};

pub const QUEUE4_MAX_QUEUE_DIFF: f32 = 0.05;
pub const QUEUE4_MAX_MEM_STALL_TIME: u32 = 20;

pub struct Queue4 {
    core: SchedulerCore,

    mem_queue_size: usize,
    pim_queue_size: usize,

    last_pim_row: Option<u32>,
    pim_batch_start: u64,

    mem_stall_time: u32,
}

impl Queue4 {
    pub fn new(cfg: &MemoryConfig) -> Queue4 {
        Queue4 {
            core: SchedulerCore::new(cfg),
            mem_queue_size: cfg.mem_capacity().max(1),
            pim_queue_size: cfg.pim_queue_size.max(1),
            last_pim_row: None,
            pim_batch_start: 0,
            mem_stall_time: 0,
        }
    }

    fn queues_imbalanced(&self, mode: MemoryMode) -> bool {
        let pim_occupancy = self.core.num_pim_pending as f32 / self.pim_queue_size as f32;
        let mem_occupancy =
            (self.core.num_pending + self.core.num_write_pending) as f32 / self.mem_queue_size as f32;

        if mode == MemoryMode::Pim {
            mem_occupancy - pim_occupancy > QUEUE4_MAX_QUEUE_DIFF
        }
        else {
            pim_occupancy - mem_occupancy > QUEUE4_MAX_QUEUE_DIFF
        }
    }
}

impl SchedulerPolicy for Queue4 {
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

            if (have_reads || have_writes) && self.pim_batch_start > 0 {
                self.mem_stall_time += 1;
            }

            if ((batch_over && self.queues_imbalanced(*ctx.mode))
                || self.mem_stall_time > QUEUE4_MAX_MEM_STALL_TIME
                || !have_pim)
                && (have_reads || have_writes)
            {
                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("queue4: switching to non-PIM mode");
            }
        }
        else if (self.queues_imbalanced(*ctx.mode) || !(have_reads || have_writes)) && have_pim {
            self.pim_batch_start = 0;
            self.mem_stall_time = 0;

            *ctx.mode = MemoryMode::Pim;
            ctx.stats.nonpim_to_pim_switches += 1;
            log::debug!("queue4: switching to PIM mode");
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
}
