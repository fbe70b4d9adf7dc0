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

    sched/i1.rs

    PIM transaction policy. A PIM transaction ends at a store boundary; the
    duration of the last transaction sets the per-bank MEM request budget for
    the following MEM phase, after which the channel returns to PIM.

*/

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    request::{Req, ReqId},
    sched::{
        core::{MissPick, SchedulerCore},
        SchedCtx,
        SchedulerPolicy,
    },
};

/// PIM stores are issued as fixed 16-byte column bursts; anything larger is
/// an operand fetch.
const PIM_STORE_BYTES: u32 = 16;

pub struct I1 {
    core: SchedulerCore,

    reqs_per_bank: Vec<u32>,
    max_req_per_bank: u32,

    pim_transaction_start: u64,
    pim_last_transaction_dur: u64,

    last_pim_was_store: bool,
}

impl I1 {
    pub fn new(cfg: &MemoryConfig) -> I1 {
        I1 {
            core: SchedulerCore::new(cfg),
            reqs_per_bank: vec![0; cfg.nbk],
            max_req_per_bank: 0,
            pim_transaction_start: 0,
            pim_last_transaction_dur: 0,
            last_pim_was_store: false,
        }
    }

    fn is_pim_store(req: &Req) -> bool {
        req.nbytes == PIM_STORE_BYTES
    }
}

impl SchedulerPolicy for I1 {
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

        if *ctx.mode == MemoryMode::Pim {
            // The transaction is over when the previous PIM request was a
            // store and the next one is not (or nothing is left).
            let next_is_store = self
                .core
                .pim_oldest()
                .map(|rid| Self::is_pim_store(ctx.arena.get(rid)))
                .unwrap_or(false);
            let transaction_over = self.last_pim_was_store && (!have_pim || !next_is_store);

            if transaction_over {
                self.reqs_per_bank.iter_mut().for_each(|c| *c = 0);

                self.pim_last_transaction_dur = ctx.cycle - self.pim_transaction_start;
                self.pim_transaction_start = 0;

                self.max_req_per_bank = ((self.pim_last_transaction_dur * 2) / ctx.cfg.t_rc.max(1) as u64) as u32;

                self.last_pim_was_store = false;

                if have_reads || have_writes {
                    *ctx.mode = MemoryMode::Read;
                    ctx.stats.pim_to_nonpim_switches += 1;
                    log::debug!("i1: switching to non-PIM mode");
                }
            }
        }
        else {
            let budget_spent =
                have_pim && self.reqs_per_bank.iter().any(|&c| c > self.max_req_per_bank);

            if budget_spent || !(have_reads || have_writes) {
                if have_pim {
                    *ctx.mode = MemoryMode::Pim;
                    ctx.stats.nonpim_to_pim_switches += 1;
                    log::debug!("i1: switching to PIM mode");
                }
            }
        }

        self.core.update_rw_mode(ctx);
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule(bank, curr_row, MissPick::OldestAny, ctx);

        if rid.is_some() {
            self.reqs_per_bank[bank] += 1;
        }

        rid
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule_pim(ctx)?;

        if self.pim_transaction_start == 0 {
            self.pim_transaction_start = ctx.cycle;
        }
        self.last_pim_was_store = Self::is_pim_store(ctx.arena.get(rid));

        Some(rid)
    }
}
