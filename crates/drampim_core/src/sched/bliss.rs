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

    sched/bliss.rs

    BLISS-style blacklisting. A request class served more than the threshold
    number of times consecutively is blacklisted and deprioritized; a
    periodic clearing interval resets all blacklist state. While neither or
    both classes are blacklisted, arbitration falls back to oldest-first.
    PIM requests are threaded through the bank queues.

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
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ServedClass {
    None,
    Mem,
    Pim,
}

pub struct Bliss {
    core: SchedulerCore,

    /// Per-bank markers for PIM requests living inside the bank queues.
    pim_marks: Vec<VecDeque<ReqId>>,
    last_pim_row: Option<u32>,

    requests_served: u32,
    prev_request_class: ServedClass,

    pim_blacklisted: bool,
    mem_blacklisted: bool,

    // Blacklist residency statistics.
    cycles_none_blacklisted: u64,
    cycles_both_blacklisted: u64,
    cycles_pim_blacklisted: u64,
    cycles_mem_blacklisted: u64,
}

impl Bliss {
    pub fn new(cfg: &MemoryConfig) -> Bliss {
        Bliss {
            core: SchedulerCore::new(cfg),
            pim_marks: vec![VecDeque::new(); cfg.nbk],
            last_pim_row: None,
            requests_served: 0,
            prev_request_class: ServedClass::None,
            pim_blacklisted: false,
            mem_blacklisted: false,
            cycles_none_blacklisted: 0,
            cycles_both_blacklisted: 0,
            cycles_pim_blacklisted: 0,
            cycles_mem_blacklisted: 0,
        }
    }

    fn update_blacklist(&mut self, class: ServedClass, threshold: u32) {
        if self.prev_request_class == class {
            self.requests_served += 1;
        }
        else {
            self.requests_served = 0;
        }
        self.prev_request_class = class;

        if self.requests_served > threshold {
            match class {
                ServedClass::Mem => {
                    if !self.mem_blacklisted {
                        log::debug!("bliss: blacklisting MEM");
                    }
                    self.mem_blacklisted = true;
                }
                ServedClass::Pim => {
                    if !self.pim_blacklisted {
                        log::debug!("bliss: blacklisting PIM");
                    }
                    self.pim_blacklisted = true;
                }
                ServedClass::None => {}
            }
            self.requests_served = 0;
        }
    }

    fn oldest_pim(&self) -> Option<ReqId> {
        self.pim_marks[0].back().copied()
    }
}

impl SchedulerPolicy for Bliss {
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

            if ctx.stats.first_non_pim_insert == 0 {
                ctx.stats.first_non_pim_insert = ctx.cycle;
            }
        }
    }

    fn update_mode(&mut self, ctx: &mut SchedCtx) {
        let prev_mode = *ctx.mode;
        let num_mem_pending = self.core.num_pending;
        let num_pim_pending = self.core.num_pim_pending;

        if ctx.cycle % ctx.cfg.bliss_clearing_interval == 0 {
            self.requests_served = 0;
            self.prev_request_class = ServedClass::None;
            self.pim_blacklisted = false;
            self.mem_blacklisted = false;
            log::debug!("bliss: reached clearing interval");
        }

        match (self.pim_blacklisted, self.mem_blacklisted) {
            (false, false) => self.cycles_none_blacklisted += 1,
            (true, true) => self.cycles_both_blacklisted += 1,
            (true, false) => self.cycles_pim_blacklisted += 1,
            (false, true) => self.cycles_mem_blacklisted += 1,
        }

        if self.pim_blacklisted == self.mem_blacklisted {
            // Neither or both blacklisted: oldest-first arbitration.
            if *ctx.mode == MemoryMode::Pim {
                if num_pim_pending == 0 {
                    if num_mem_pending > 0 {
                        *ctx.mode = MemoryMode::Read;
                    }
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
            else if num_mem_pending == 0 {
                if num_pim_pending > 0 {
                    *ctx.mode = MemoryMode::Pim;
                }
            }
            else {
                let mut switch_to_pim = true;
                for bank in 0..ctx.banks.len() {
                    switch_to_pim = switch_to_pim
                        && !self.core.is_next_req_hit(bank, ctx.banks[bank].curr_row, *ctx.mode, ctx.cfg)
                        && self
                            .core
                            .queue_oldest(bank)
                            .map(|rid| ctx.arena.get(rid).is_pim)
                            .unwrap_or(false);
                }
                if switch_to_pim {
                    *ctx.mode = MemoryMode::Pim;
                }
            }
        }
        else if self.pim_blacklisted {
            *ctx.mode = if num_mem_pending > 0 { MemoryMode::Read } else { MemoryMode::Pim };
        }
        else {
            *ctx.mode = if num_pim_pending > 0 { MemoryMode::Pim } else { MemoryMode::Read };
        }

        if *ctx.mode != prev_mode {
            if prev_mode == MemoryMode::Pim {
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("bliss: switching to non-PIM mode");
            }
            else {
                ctx.stats.nonpim_to_pim_switches += 1;
                self.last_pim_row = None;
                log::debug!("bliss: switching to PIM mode");
            }
        }
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule(bank, curr_row, MissPick::SkipIfOldestPim, ctx)?;
        self.update_blacklist(ServedClass::Mem, ctx.cfg.bliss_blacklisting_threshold);
        Some(rid)
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let Bliss { core, pim_marks, .. } = self;
        let rid = core.schedule_pim_from_bank_queues(pim_marks, ctx)?;
        self.update_blacklist(ServedClass::Pim, ctx.cfg.bliss_blacklisting_threshold);
        self.last_pim_row = Some(ctx.arena.get(rid).row);
        Some(rid)
    }

    fn extended_stats(&self, _cfg: &MemoryConfig) -> Option<String> {
        let mut out = String::new();
        let _ = writeln!(out, "Blacklist statistics:");
        let _ = writeln!(out, "Cycles_none_blacklisted = {}", self.cycles_none_blacklisted);
        let _ = writeln!(out, "Cycles_both_blacklisted = {}", self.cycles_both_blacklisted);
        let _ = writeln!(out, "Cycles_PIM_blacklisted = {}", self.cycles_pim_blacklisted);
        let _ = writeln!(out, "Cycles_MEM_blacklisted = {}", self.cycles_mem_blacklisted);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_streak_and_clear() {
        let cfg = MemoryConfig {
            nbk: 2,
            nbkgrp: 1,
            bliss_blacklisting_threshold: 3,
            ..Default::default()
        };
        let mut bliss = Bliss::new(&cfg);

        // A streak longer than the threshold blacklists the class.
        for _ in 0..5 {
            bliss.update_blacklist(ServedClass::Mem, cfg.bliss_blacklisting_threshold);
        }
        assert!(bliss.mem_blacklisted);
        assert!(!bliss.pim_blacklisted);

        // An interleaved class resets the streak counter.
        bliss.update_blacklist(ServedClass::Pim, cfg.bliss_blacklisting_threshold);
        assert_eq!(bliss.requests_served, 0);
    }
}
