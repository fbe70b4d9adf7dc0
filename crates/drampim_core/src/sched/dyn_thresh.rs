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

    sched/dyn_thresh.rs

    Dynamic-threshold arbitration. The MEM occupancy threshold that pulls the
    channel out of PIM mode adapts: repeated occupancy trips double it (up to
    the high watermark), a stall-time trip re-seats it at 80% of the current
    occupancy. Stall-time caps bound both classes. PIM requests are threaded
    through the bank queues.

*/

use std::collections::VecDeque;

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

/// Occupancy trips tolerated before the threshold doubles.
pub const DYN_THRESH_MAX_OCCUPANCY_HITS: u32 = 2;

pub struct DynThresh {
    core: SchedulerCore,

    pim_marks: Vec<VecDeque<ReqId>>,
    last_pim_row: Option<u32>,

    bank_pending_mem_requests: Vec<u64>,

    mem_stall_time: u32,
    pim_stall_time: u32,
    max_pim_stall_time: u32,
    num_times_mem_hit_occupancy: u32,

    max_mem_occupancy: usize,
}

impl DynThresh {
    pub fn new(cfg: &MemoryConfig) -> DynThresh {
        DynThresh {
            core: SchedulerCore::new(cfg),
            pim_marks: vec![VecDeque::new(); cfg.nbk],
            last_pim_row: None,
            bank_pending_mem_requests: vec![0; cfg.nbk],
            mem_stall_time: 0,
            pim_stall_time: 0,
            max_pim_stall_time: cfg.queue_high_watermark as u32 * 3,
            num_times_mem_hit_occupancy: 0,
            max_mem_occupancy: cfg.queue_high_watermark,
        }
    }
}

impl SchedulerPolicy for DynThresh {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn add_req(&mut self, rid: ReqId, ctx: &mut SchedCtx) {
        let req = ctx.arena.get(rid);
        if req.is_pim {
            assert!(
                ctx.cfg.pim_queue_size == 0 || self.core.num_pim_pending < ctx.cfg.pim_queue_size,
                "PIM request admitted into a full PIM queue"
            );
            self.core.num_pim_pending += 1;
            self.core.add_pim_to_bank_queues(rid, &mut self.pim_marks);

            if ctx.stats.first_pim_insert == 0 {
                ctx.stats.first_pim_insert = ctx.cycle;
            }
        }
        else {
            assert!(
                ctx.cfg.mem_queue_size == 0 || self.core.num_pending < ctx.cfg.mem_queue_size,
                "request admitted into a full MEM queue"
            );
            self.core.num_pending += 1;
            self.core.queue[req.bk].push_front(rid);
            self.core.bins[req.bk].entry(req.row).or_default().push_front(rid);
            self.bank_pending_mem_requests[req.bk] += 1;

            if ctx.stats.first_non_pim_insert == 0 {
                ctx.stats.first_non_pim_insert = ctx.cycle;
            }
        }
    }

    fn update_mode(&mut self, ctx: &mut SchedCtx) {
        let prev_mode = *ctx.mode;

        if *ctx.mode == MemoryMode::Pim {
            let stall_exceeded = self.mem_stall_time > ctx.cfg.frfcfs_cap;
            let occupancy_exceeded = self.core.num_pending > self.max_mem_occupancy;

            if stall_exceeded {
                // MEM waited too long; re-seat the threshold at 80% of the
                // backlog that built up, clamped to [1, high watermark].
                *ctx.mode = MemoryMode::Read;
                self.num_times_mem_hit_occupancy = 0;
                self.max_mem_occupancy = ((self.core.num_pending as f64 * 0.8) as usize)
                    .min(ctx.cfg.queue_high_watermark)
                    .max(1);
                log::debug!("dyn_thresh: MEM stall cap hit; threshold now {}", self.max_mem_occupancy);
            }
            else if occupancy_exceeded {
                // Frequent occupancy trips mean the threshold is too tight;
                // doubling it reduces switching frequency.
                *ctx.mode = MemoryMode::Read;
                self.num_times_mem_hit_occupancy += 1;

                if self.num_times_mem_hit_occupancy > DYN_THRESH_MAX_OCCUPANCY_HITS {
                    self.max_mem_occupancy = (self.max_mem_occupancy * 2).min(ctx.cfg.queue_high_watermark);
                    self.num_times_mem_hit_occupancy = 0;
                    log::debug!("dyn_thresh: widening threshold to {}", self.max_mem_occupancy);
                }
            }
            else if self.core.num_pim_pending == 0 && self.core.num_pending > 0 {
                *ctx.mode = MemoryMode::Read;
                self.num_times_mem_hit_occupancy = 0;
            }
        }
        else if self.pim_stall_time > self.max_pim_stall_time {
            *ctx.mode = MemoryMode::Pim;
        }
        else if self.core.num_pending == 0 && self.core.num_pim_pending > 0 {
            *ctx.mode = MemoryMode::Pim;
        }

        if *ctx.mode != prev_mode {
            if prev_mode == MemoryMode::Pim {
                ctx.stats.pim_to_nonpim_switches += 1;
                self.last_pim_row = None;
                self.pim_stall_time = 0;
            }
            else {
                ctx.stats.nonpim_to_pim_switches += 1;
                self.mem_stall_time = 0;
            }
        }
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule(bank, curr_row, MissPick::OldestMem, ctx)?;

        self.bank_pending_mem_requests[bank] -= 1;
        if self.core.num_pim_pending > 0 {
            self.pim_stall_time += 1;
        }

        Some(rid)
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let DynThresh { core, pim_marks, .. } = self;
        let rid = core.schedule_pim_from_bank_queues(pim_marks, ctx)?;

        self.last_pim_row = Some(ctx.arena.get(rid).row);
        if self.core.num_pending > 0 {
            self.mem_stall_time += 1;
        }

        Some(rid)
    }
}
