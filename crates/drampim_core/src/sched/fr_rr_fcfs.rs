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

    sched/fr_rr_fcfs.rs

    Oldest-first arbitration on per-bank row-buffer conflicts, without a
    bypass cap. A bank that has latched its conflict flag stops issuing and
    waits for the collective switch; PIM cedes on its own first conflict.

*/

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

pub struct FrRrFcfs {
    core: SchedulerCore,

    last_pim_row: Option<u32>,
    bank_switch_to_pim: Vec<bool>,
    bank_pending_mem_requests: Vec<u64>,

    num_exec_pim: u32,
    num_exec_mem_per_bank: Vec<u32>,

    pim_requests_issued: Series,
    max_mem_requests_issued: Series,
    mem2pim_switch_reason: [u64; NUM_SWITCH_REASONS],
    pim2mem_switch_reason: [u64; NUM_SWITCH_REASONS],
}

impl FrRrFcfs {
    pub fn new(cfg: &MemoryConfig) -> FrRrFcfs {
        FrRrFcfs {
            core: SchedulerCore::new(cfg),
            last_pim_row: None,
            bank_switch_to_pim: vec![false; cfg.nbk],
            bank_pending_mem_requests: vec![0; cfg.nbk],
            num_exec_pim: 0,
            num_exec_mem_per_bank: vec![0; cfg.nbk],
            pim_requests_issued: Series::default(),
            max_mem_requests_issued: Series::default(),
            mem2pim_switch_reason: [0; NUM_SWITCH_REASONS],
            pim2mem_switch_reason: [0; NUM_SWITCH_REASONS],
        }
    }
}

impl SchedulerPolicy for FrRrFcfs {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn add_req(&mut self, rid: ReqId, ctx: &mut SchedCtx) {
        self.core.add_req(rid, ctx);

        if !ctx.arena.get(rid).is_pim {
            self.bank_pending_mem_requests[ctx.arena.get(rid).bk] += 1;
        }
    }

    fn update_mode(&mut self, ctx: &mut SchedCtx) {
        let prev_mode = *ctx.mode;

        if *ctx.mode == MemoryMode::Pim && self.core.num_pending > 0 {
            if self.core.num_pim_pending == 0 {
                *ctx.mode = MemoryMode::Read;
                self.pim2mem_switch_reason[SwitchReason::OutOfRequests.index()] += 1;
            }
            else {
                // PIM cedes on its own row-buffer conflict.
                let front_row = ctx.arena.get(self.core.pim_oldest().unwrap()).row;
                if self.last_pim_row.is_some() && self.last_pim_row != Some(front_row) {
                    *ctx.mode = MemoryMode::Read;
                    self.pim2mem_switch_reason[SwitchReason::RowBufferConflict.index()] += 1;
                }
            }
        }
        else if *ctx.mode != MemoryMode::Pim && self.core.num_pim_pending > 0 {
            if self.core.num_pending == 0 {
                *ctx.mode = MemoryMode::Pim;
                self.mem2pim_switch_reason[SwitchReason::OutOfRequests.index()] += 1;
            }
            else {
                let mut switch_to_pim = true;

                for bank in 0..ctx.banks.len() {
                    if !self.bank_switch_to_pim[bank] {
                        // Drained banks may switch; busy banks take the
                        // row-hit test once a request has been issued.
                        let mut can_switch = self.bank_pending_mem_requests[bank] == 0;

                        if self.bank_pending_mem_requests[bank] > 0 && ctx.banks[bank].mrq.is_some() {
                            can_switch =
                                !self.core.is_next_req_hit(bank, ctx.banks[bank].curr_row, *ctx.mode, ctx.cfg);
                        }

                        self.bank_switch_to_pim[bank] = can_switch;
                    }

                    switch_to_pim = switch_to_pim && self.bank_switch_to_pim[bank];
                }

                if switch_to_pim {
                    *ctx.mode = MemoryMode::Pim;
                    self.mem2pim_switch_reason[SwitchReason::RowBufferConflict.index()] += 1;
                }
            }
        }

        if *ctx.mode != prev_mode {
            if prev_mode == MemoryMode::Pim {
                ctx.stats.pim_to_nonpim_switches += 1;
                self.pim_requests_issued.push(self.num_exec_pim as u64);
                self.last_pim_row = None;
                log::debug!("fr_rr_fcfs: switching to non-PIM mode");
            }
            else {
                ctx.stats.nonpim_to_pim_switches += 1;
                self.max_mem_requests_issued
                    .push(self.num_exec_mem_per_bank.iter().copied().max().unwrap_or(0) as u64);
                self.bank_switch_to_pim.iter_mut().for_each(|b| *b = false);
                self.num_exec_mem_per_bank.iter_mut().for_each(|c| *c = 0);
                self.num_exec_pim = 0;
                log::debug!("fr_rr_fcfs: switching to PIM mode");
            }
        }
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        if self.bank_switch_to_pim[bank] {
            // The bank already conflicted; it waits for the PIM switch.
            return None;
        }

        let rid = self.core.schedule(bank, curr_row, MissPick::OldestAny, ctx)?;

        self.num_exec_mem_per_bank[bank] += 1;
        self.bank_pending_mem_requests[bank] -= 1;

        Some(rid)
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule_pim(ctx)?;

        self.last_pim_row = Some(ctx.arena.get(rid).row);
        self.num_exec_pim += 1;

        Some(rid)
    }

    fn extended_stats(&self, _cfg: &MemoryConfig) -> Option<String> {
        let mut out = String::new();
        let _ = writeln!(out, "AvgPimRequestsPerPhase = {:.6}", self.pim_requests_issued.mean());
        let _ = writeln!(out, "AvgMaxMemRequestsPerPhase = {:.6}", self.max_mem_requests_issued.mean());
        for reason in [SwitchReason::OutOfRequests, SwitchReason::RowBufferConflict] {
            let _ = writeln!(
                out,
                "mem2pim_{} = {}",
                reason.label(),
                self.mem2pim_switch_reason[reason.index()]
            );
        }
        for reason in [SwitchReason::OutOfRequests, SwitchReason::RowBufferConflict] {
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
