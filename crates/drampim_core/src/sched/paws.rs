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

    sched/paws.rs

    PIM-aware work scheduling. Banks latch a "ready to switch" flag on their
    first row-buffer conflict against an older PIM request; the switch to PIM
    fires when every bank has latched. Executed-request caps bound both
    phases: the PIM phase by `frfcfs_cap` requests, the following MEM phase
    by a per-bank budget derived from the PIM requests actually executed.

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
    stats::{Series, SwitchReason, NUM_SWITCH_REASONS},
};

pub struct Paws {
    core: SchedulerCore,

    pim_marks: Vec<VecDeque<ReqId>>,
    last_pim_row: Option<u32>,

    bank_switch_to_pim: Vec<bool>,
    bank_pending_mem_requests: Vec<u64>,

    num_exec_pim: u32,
    max_exec_mem_per_bank: u32,
    num_exec_mem_per_bank: Vec<u32>,

    bank_pim_stall_time: Vec<u64>,
    bank_pim_waste_time: Vec<u64>,

    switch_ready_since: u64,
    mem2pim_switch_latency: Series,
    mem_cap: Series,
    pim_requests_issued: Series,
    max_mem_requests_issued: Series,

    mem2pim_switch_reason: [u64; NUM_SWITCH_REASONS],
    pim2mem_switch_reason: [u64; NUM_SWITCH_REASONS],
}

impl Paws {
    pub fn new(cfg: &MemoryConfig) -> Paws {
        Paws {
            core: SchedulerCore::new(cfg),
            pim_marks: vec![VecDeque::new(); cfg.nbk],
            last_pim_row: None,
            bank_switch_to_pim: vec![false; cfg.nbk],
            bank_pending_mem_requests: vec![0; cfg.nbk],
            num_exec_pim: 0,
            max_exec_mem_per_bank: 0,
            num_exec_mem_per_bank: vec![0; cfg.nbk],
            bank_pim_stall_time: vec![0; cfg.nbk],
            bank_pim_waste_time: vec![0; cfg.nbk],
            switch_ready_since: 0,
            mem2pim_switch_latency: Series::default(),
            mem_cap: Series::default(),
            pim_requests_issued: Series::default(),
            max_mem_requests_issued: Series::default(),
            mem2pim_switch_reason: [0; NUM_SWITCH_REASONS],
            pim2mem_switch_reason: [0; NUM_SWITCH_REASONS],
        }
    }

    fn oldest_pim(&self) -> Option<ReqId> {
        self.pim_marks[0].back().copied()
    }
}

impl SchedulerPolicy for Paws {
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
            let cap_exceeded = ctx.cfg.frfcfs_cap > 0 && self.num_exec_pim > ctx.cfg.frfcfs_cap;

            if cap_exceeded && self.core.num_pending > 0 {
                *ctx.mode = MemoryMode::Read;
                self.pim2mem_switch_reason[SwitchReason::CapExceeded.index()] += 1;
            }
            else if self.core.num_pim_pending == 0 {
                if self.core.num_pending > 0 {
                    *ctx.mode = MemoryMode::Read;
                    self.pim2mem_switch_reason[SwitchReason::OutOfRequests.index()] += 1;
                }
            }
            else {
                let oldest_row = ctx.arena.get(self.oldest_pim().unwrap()).row;
                if self.last_pim_row.is_some() && self.last_pim_row != Some(oldest_row) {
                    for bank in 0..ctx.banks.len() {
                        if let Some(oldest) = self.core.queue_oldest(bank) {
                            if !ctx.arena.get(oldest).is_pim {
                                *ctx.mode = MemoryMode::Read;
                                self.pim2mem_switch_reason[SwitchReason::OldestFirst.index()] += 1;
                                break;
                            }
                        }
                    }
                }
            }
        }
        else {
            let cap_exceeded = self.max_exec_mem_per_bank > 0
                && self
                    .num_exec_mem_per_bank
                    .iter()
                    .any(|&n| n > self.max_exec_mem_per_bank);

            if cap_exceeded && self.core.num_pim_pending > 0 {
                *ctx.mode = MemoryMode::Pim;
                self.mem2pim_switch_reason[SwitchReason::CapExceeded.index()] += 1;
            }
            else if self.core.num_pending == 0 {
                if self.core.num_pim_pending > 0 {
                    *ctx.mode = MemoryMode::Pim;
                    self.mem2pim_switch_reason[SwitchReason::OutOfRequests.index()] += 1;
                }
            }
            else {
                let mut switch_to_pim = true;
                let mut any_bank_ready = false;

                for bank in 0..ctx.banks.len() {
                    // A drained bank can switch; a bank that has issued at
                    // least one request switches on its first conflict
                    // against an older PIM request.
                    let mut can_switch = self.bank_pending_mem_requests[bank] == 0;

                    if self.bank_pending_mem_requests[bank] > 0 && ctx.banks[bank].mrq.is_some() {
                        can_switch = !self.core.is_next_req_hit(bank, ctx.banks[bank].curr_row, *ctx.mode, ctx.cfg)
                            && self
                                .core
                                .queue_oldest(bank)
                                .map(|rid| ctx.arena.get(rid).is_pim)
                                .unwrap_or(false);
                    }

                    self.bank_switch_to_pim[bank] = self.bank_switch_to_pim[bank] || can_switch;
                    switch_to_pim = switch_to_pim && self.bank_switch_to_pim[bank];
                    any_bank_ready = any_bank_ready || self.bank_switch_to_pim[bank];
                }

                if switch_to_pim {
                    *ctx.mode = MemoryMode::Pim;
                    self.mem2pim_switch_reason[SwitchReason::OldestFirst.index()] += 1;
                }
                else if any_bank_ready {
                    if self.switch_ready_since == 0 {
                        self.switch_ready_since = ctx.cycle;
                    }

                    for bank in 0..ctx.banks.len() {
                        if self.bank_switch_to_pim[bank] {
                            self.bank_pim_stall_time[bank] += 1;
                            if self.bank_pending_mem_requests[bank] > 0 {
                                self.bank_pim_waste_time[bank] += 1;
                            }
                        }
                    }
                }
            }
        }

        if *ctx.mode != prev_mode {
            if prev_mode == MemoryMode::Pim {
                ctx.stats.pim_to_nonpim_switches += 1;
                self.pim_requests_issued.push(self.num_exec_pim as u64);
                self.last_pim_row = None;
                log::debug!("paws: switching to non-PIM mode");
            }
            else {
                ctx.stats.nonpim_to_pim_switches += 1;

                self.max_mem_requests_issued
                    .push(self.num_exec_mem_per_bank.iter().copied().max().unwrap_or(0) as u64);

                self.bank_switch_to_pim.iter_mut().for_each(|b| *b = false);

                self.max_exec_mem_per_bank =
                    ctx.cfg.frfcfs_cap.min(self.num_exec_pim) * ctx.cfg.max_pim_slowdown;
                self.num_exec_mem_per_bank.iter_mut().for_each(|c| *c = 0);
                self.num_exec_pim = 0;

                if self.switch_ready_since > 0 {
                    self.mem2pim_switch_latency.push(ctx.cycle - self.switch_ready_since);
                }
                else {
                    self.mem2pim_switch_latency.push(0);
                }
                self.switch_ready_since = 0;

                self.mem_cap.push(self.max_exec_mem_per_bank as u64);
                log::debug!("paws: switching to PIM mode");
            }
        }
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule(bank, curr_row, MissPick::OldestMem, ctx)?;

        self.num_exec_mem_per_bank[bank] += 1;
        self.bank_pending_mem_requests[bank] -= 1;

        Some(rid)
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let Paws { core, pim_marks, .. } = self;
        let rid = core.schedule_pim_from_bank_queues(pim_marks, ctx)?;

        self.last_pim_row = Some(ctx.arena.get(rid).row);
        self.num_exec_pim += 1;

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
        let _ = writeln!(out, "AvgMemCap = {:.6}", self.mem_cap.mean());
        let _ = writeln!(out, "AvgPimRequestsPerPhase = {:.6}", self.pim_requests_issued.mean());
        let _ = writeln!(out, "AvgMaxMemRequestsPerPhase = {:.6}", self.max_mem_requests_issued.mean());
        for reason in [SwitchReason::OldestFirst, SwitchReason::OutOfRequests, SwitchReason::CapExceeded] {
            let _ = writeln!(
                out,
                "mem2pim_{} = {}",
                reason.label(),
                self.mem2pim_switch_reason[reason.index()]
            );
        }
        for reason in [SwitchReason::OldestFirst, SwitchReason::OutOfRequests, SwitchReason::CapExceeded] {
            let _ = writeln!(
                out,
                "pim2mem_{} = {}",
                reason.label(),
                self.pim2mem_switch_reason[reason.index()]
            );
        }
        Some(out)
    }
}
