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

    sched/pim_frfcfs.rs

    FR-FCFS with PIM requests threaded through the bank queues and a
    promotion cap: every time a younger request is served over an older one
    of the other class, the bank's promotion count grows; past `frfcfs_cap`
    the mode is forced over. Per-bank PIM stall/waste time and switch
    readiness latency are tracked for the report.

*/

use std::collections::VecDeque;
use std::fmt::Write;

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    request::ReqId,
    sched::{
        core::{MissPick, SchedulerCore},
        SchedCtx,
        SchedulerPolicy,
    },
    stats::Series,
};

pub struct PimFrfcfs {
    core: SchedulerCore,

    pim_marks: Vec<VecDeque<ReqId>>,
    last_pim_row: Option<u32>,

    promotion_count: Vec<u32>,
    bank_pending_mem_requests: Vec<u64>,

    bank_pim_stall_time: Vec<u64>,
    bank_pim_waste_time: Vec<u64>,
    switch_ready_since: u64,
    mem2pim_switch_latency: Series,
}

impl PimFrfcfs {
    pub fn new(cfg: &MemoryConfig) -> PimFrfcfs {
        PimFrfcfs {
            core: SchedulerCore::new(cfg),
            pim_marks: vec![VecDeque::new(); cfg.nbk],
            last_pim_row: None,
            promotion_count: vec![0; cfg.nbk],
            bank_pending_mem_requests: vec![0; cfg.nbk],
            bank_pim_stall_time: vec![0; cfg.nbk],
            bank_pim_waste_time: vec![0; cfg.nbk],
            switch_ready_since: 0,
            mem2pim_switch_latency: Series::default(),
        }
    }

    fn oldest_pim(&self) -> Option<ReqId> {
        self.pim_marks[0].back().copied()
    }
}

impl SchedulerPolicy for PimFrfcfs {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn add_req(&mut self, rid: ReqId, ctx: &mut SchedCtx) {
        // PIM requests occupy a slot in the shared pending count as well.
        assert!(
            ctx.cfg.mem_queue_size == 0 || self.core.num_pending < ctx.cfg.mem_queue_size,
            "request admitted into a full queue"
        );
        self.core.num_pending += 1;

        let req = ctx.arena.get(rid);
        if req.is_pim {
            self.core.num_pim_pending += 1;
            self.core.add_pim_to_bank_queues(rid, &mut self.pim_marks);

            if ctx.stats.first_pim_insert == 0 {
                ctx.stats.first_pim_insert = ctx.cycle;
            }
        }
        else {
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
        let num_mem_pending = self.core.num_pending - self.core.num_pim_pending;

        let cap_exceeded =
            ctx.cfg.frfcfs_cap > 0 && self.promotion_count.iter().any(|&c| c >= ctx.cfg.frfcfs_cap);

        if *ctx.mode == MemoryMode::Pim {
            if cap_exceeded {
                *ctx.mode = MemoryMode::Read;
            }
            else if self.core.num_pim_pending == 0 {
                *ctx.mode = MemoryMode::Read;
            }
            else {
                let oldest_row = ctx.arena.get(self.oldest_pim().unwrap()).row;
                if self.last_pim_row != Some(oldest_row) {
                    // PIM conflicts; yield if any bank's oldest is MEM.
                    for bank in 0..ctx.banks.len() {
                        if let Some(oldest) = self.core.queue_oldest(bank) {
                            if !ctx.arena.get(oldest).is_pim {
                                *ctx.mode = MemoryMode::Read;
                            }
                        }
                    }
                }
            }
        }
        else if cap_exceeded {
            *ctx.mode = MemoryMode::Pim;
        }
        else if num_mem_pending == 0 {
            *ctx.mode = MemoryMode::Pim;
        }
        else {
            let mut switch_to_pim = true;
            let mut any_ready = false;

            for bank in 0..ctx.banks.len() {
                let ready = self.core.last_row[bank].is_none()
                    && self
                        .core
                        .queue_oldest(bank)
                        .map(|rid| ctx.arena.get(rid).is_pim)
                        .unwrap_or(false);

                switch_to_pim = switch_to_pim && ready;
                any_ready = any_ready || ready;

                if ready {
                    self.bank_pim_stall_time[bank] += 1;
                    if self.bank_pending_mem_requests[bank] > 0 {
                        self.bank_pim_waste_time[bank] += 1;
                    }
                }
            }

            if switch_to_pim {
                *ctx.mode = MemoryMode::Pim;
            }
            else if any_ready && self.switch_ready_since == 0 {
                self.switch_ready_since = ctx.cycle;
            }
        }

        if *ctx.mode != prev_mode {
            self.promotion_count.iter_mut().for_each(|c| *c = 0);

            if prev_mode == MemoryMode::Pim {
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("pim_frfcfs: switching to non-PIM mode");
            }
            else {
                ctx.stats.nonpim_to_pim_switches += 1;
                self.last_pim_row = None;

                if self.switch_ready_since > 0 {
                    self.mem2pim_switch_latency.push(ctx.cycle - self.switch_ready_since);
                }
                else {
                    self.mem2pim_switch_latency.push(0);
                }
                self.switch_ready_since = 0;

                log::debug!("pim_frfcfs: switching to PIM mode");
            }
        }
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let oldest_is_pim = self
            .core
            .queue_oldest(bank)
            .map(|rid| ctx.arena.get(rid).is_pim)
            .unwrap_or(false);

        let rid = self.core.schedule(bank, curr_row, MissPick::SkipIfOldestPim, ctx)?;

        // A row-buffer hit was just favored over an older PIM request.
        if oldest_is_pim {
            self.promotion_count[bank] += 1;
        }

        self.bank_pending_mem_requests[bank] -= 1;
        Some(rid)
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        if self.oldest_pim().is_none() {
            return None;
        }

        // A PIM request is about to be favored over any older MEM waiters.
        for bank in 0..ctx.banks.len() {
            if let Some(oldest) = self.core.queue_oldest(bank) {
                if !ctx.arena.get(oldest).is_pim {
                    self.promotion_count[bank] += 1;
                }
            }
        }

        let PimFrfcfs { core, pim_marks, .. } = self;
        let rid = core.schedule_pim_from_bank_queues(pim_marks, ctx)?;

        debug_assert!(self.core.num_pending > 0);
        self.core.num_pending -= 1;
        self.last_pim_row = Some(ctx.arena.get(rid).row);

        Some(rid)
    }

    fn extended_stats(&self, _cfg: &MemoryConfig) -> Option<String> {
        let mut out = String::new();
        let _ = writeln!(out, "Bank stall time for PIM:");
        for (bank, stall) in self.bank_pim_stall_time.iter().enumerate() {
            let _ = writeln!(out, "Bank_{}_stall_time = {}", bank, stall);
        }
        let _ = writeln!(out, "Bank waste time for PIM:");
        for (bank, waste) in self.bank_pim_waste_time.iter().enumerate() {
            let _ = writeln!(out, "Bank_{}_waste_time = {}", bank, waste);
        }
        let _ = writeln!(out, "AvgSwitchReadinessLatency = {:.6}", self.mem2pim_switch_latency.mean());
        let _ = writeln!(out, "MaxSwitchReadinessLatency = {}", self.mem2pim_switch_latency.max);
        let _ = writeln!(out, "StDevSwitchReadinessLatency = {:.6}", self.mem2pim_switch_latency.stdev());
        let _ = writeln!(
            out,
            "AvgNonZeroSwitchReadinessLatency = {:.6}",
            self.mem2pim_switch_latency.mean_nonzero()
        );
        Some(out)
    }
}
