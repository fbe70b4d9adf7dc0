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

    sched/frfcfs.rs

    Baseline FR-FCFS scheduler with oldest-first MEM/PIM arbitration and a
    bypass cap. A bank is "ready to switch" to PIM once it has no waiters, or
    its next pick is a row-buffer miss younger than the oldest PIM request;
    the switch fires when every bank is ready. After `frfcfs_cap` bypasses of
    the older class the switch is forced.

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
    stats::{SwitchReason, NUM_SWITCH_REASONS},
};

pub struct FrFcfs {
    core: SchedulerCore,

    curr_pim_row: Option<u32>,
    bank_issued_mem_req: Vec<bool>,
    bank_ready_to_switch: Vec<bool>,
    num_bypasses: u32,

    mem2pim_switch_reason: [u64; NUM_SWITCH_REASONS],
    pim2mem_switch_reason: [u64; NUM_SWITCH_REASONS],
}

impl FrFcfs {
    pub fn new(cfg: &MemoryConfig) -> FrFcfs {
        FrFcfs {
            core: SchedulerCore::new(cfg),
            curr_pim_row: None,
            bank_issued_mem_req: vec![false; cfg.nbk],
            bank_ready_to_switch: vec![false; cfg.nbk],
            num_bypasses: 0,
            mem2pim_switch_reason: [0; NUM_SWITCH_REASONS],
            pim2mem_switch_reason: [0; NUM_SWITCH_REASONS],
        }
    }

    /// True when some bank holds a MEM request older than the oldest PIM
    /// request.
    fn pim_is_oldest(&self, ctx: &SchedCtx) -> bool {
        let pim_front = match self.core.pim_oldest() {
            Some(rid) => ctx.arena.get(rid).timestamp,
            None => return true,
        };
        for bank in 0..ctx.banks.len() {
            if let Some(oldest) = self.core.queue_oldest(bank) {
                if ctx.arena.get(oldest).timestamp < pim_front {
                    return false;
                }
            }
        }
        true
    }
}

impl SchedulerPolicy for FrFcfs {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn update_mode(&mut self, ctx: &mut SchedCtx) {
        let have_mem = self.core.num_pending > 0 || self.core.num_write_pending > 0;
        let have_pim = self.core.num_pim_pending > 0;

        if *ctx.mode == MemoryMode::Pim {
            let mut switch_to_mem = false;

            if have_mem {
                if have_pim {
                    if let Some(pim_row) = self.curr_pim_row {
                        let is_pim_oldest = self.pim_is_oldest(ctx);
                        if !is_pim_oldest {
                            self.num_bypasses += 1;
                        }

                        let pim_front_row = ctx.arena.get(self.core.pim_oldest().unwrap()).row;

                        // Leave PIM mode on a PIM row conflict when an older
                        // MEM request exists, or when the cap is spent.
                        if pim_front_row != pim_row && !is_pim_oldest {
                            switch_to_mem = true;
                            self.pim2mem_switch_reason[SwitchReason::OldestFirst.index()] += 1;
                        }
                        else if ctx.cfg.frfcfs_cap > 0 && self.num_bypasses > ctx.cfg.frfcfs_cap {
                            switch_to_mem = true;
                            self.pim2mem_switch_reason[SwitchReason::CapExceeded.index()] += 1;
                        }
                    }
                }
                else {
                    switch_to_mem = true;
                    self.pim2mem_switch_reason[SwitchReason::OutOfRequests.index()] += 1;
                }
            }

            if switch_to_mem {
                self.curr_pim_row = None;
                self.num_bypasses = 0;

                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("frfcfs: switching to non-PIM mode");
            }
        }
        else {
            let mut switch_to_pim = false;

            if have_pim {
                if have_mem {
                    let pim_front = ctx.arena.get(self.core.pim_oldest().unwrap()).timestamp;
                    let mut is_pim_oldest = true;
                    switch_to_pim = true;

                    for bank in 0..ctx.banks.len() {
                        if let Some(oldest) = self.core.queue_oldest(bank) {
                            if ctx.arena.get(oldest).timestamp < pim_front {
                                is_pim_oldest = false;
                            }
                        }

                        if !self.bank_ready_to_switch[bank] {
                            // A bank is ready once it has nothing left, or it
                            // has been serviced at least once, its next pick
                            // is a conflict, and that pick is younger than
                            // the oldest PIM request. Setting the flag also
                            // stops further issue to the bank.
                            self.bank_ready_to_switch[bank] = match self.core.queue_oldest(bank) {
                                None => true,
                                Some(oldest) => {
                                    self.bank_issued_mem_req[bank]
                                        && !self.core.is_next_req_hit(
                                            bank,
                                            ctx.banks[bank].curr_row,
                                            *ctx.mode,
                                            ctx.cfg,
                                        )
                                        && ctx.arena.get(oldest).timestamp > pim_front
                                }
                            };
                        }

                        switch_to_pim = switch_to_pim && self.bank_ready_to_switch[bank];
                    }

                    if switch_to_pim {
                        self.mem2pim_switch_reason[SwitchReason::OldestFirst.index()] += 1;
                    }

                    if is_pim_oldest {
                        self.num_bypasses += 1;
                    }

                    if ctx.cfg.frfcfs_cap > 0 && self.num_bypasses > ctx.cfg.frfcfs_cap {
                        switch_to_pim = true;
                        self.mem2pim_switch_reason[SwitchReason::CapExceeded.index()] += 1;
                    }
                }
                else {
                    switch_to_pim = true;
                    self.mem2pim_switch_reason[SwitchReason::OutOfRequests.index()] += 1;
                }
            }

            if switch_to_pim {
                self.bank_issued_mem_req.iter_mut().for_each(|b| *b = false);
                self.bank_ready_to_switch.iter_mut().for_each(|b| *b = false);
                self.num_bypasses = 0;

                *ctx.mode = MemoryMode::Pim;
                ctx.stats.nonpim_to_pim_switches += 1;
                log::debug!("frfcfs: switching to PIM mode");
            }
        }

        self.core.update_rw_mode(ctx);
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        self.bank_issued_mem_req[bank] = true;

        if self.bank_ready_to_switch[bank] {
            return None;
        }

        self.core.schedule(bank, curr_row, MissPick::OldestAny, ctx)
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule_pim(ctx)?;
        self.curr_pim_row = Some(ctx.arena.get(rid).row);
        Some(rid)
    }

    fn extended_stats(&self, _cfg: &MemoryConfig) -> Option<String> {
        let mut out = String::new();
        let _ = writeln!(out, "FR-FCFS switch reasons:");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bank::Bank,
        channel::MemoryMode,
        request::{Req, ReqArena, RequestDesc},
        stats::ChannelStats,
    };

    fn mem_desc(bk: usize, row: u32, arrival: u64) -> (RequestDesc, u64) {
        (
            RequestDesc {
                chan: 0,
                bk,
                row,
                col: 0,
                is_write: false,
                is_pim: false,
                nbytes: 32,
                tag: 0,
            },
            arrival,
        )
    }

    struct Fixture {
        cfg: MemoryConfig,
        arena: ReqArena,
        banks: Vec<Bank>,
        stats: ChannelStats,
        mode: MemoryMode,
    }

    impl Fixture {
        fn new(cfg: MemoryConfig) -> Fixture {
            let banks = (0..cfg.nbk).map(|_| Bank::new(0)).collect();
            let stats = ChannelStats::new(cfg.nbk);
            Fixture {
                cfg,
                arena: ReqArena::new(),
                banks,
                stats,
                mode: MemoryMode::Read,
            }
        }

        fn add(&mut self, sched: &mut FrFcfs, desc: RequestDesc, arrival: u64) -> ReqId {
            let req = Req::new(
                &desc,
                self.cfg.nbk,
                self.cfg.nbkgrp,
                self.cfg.bank_index_policy,
                self.cfg.bankgrp_index_policy,
                arrival,
            );
            let rid = self.arena.insert(req);
            let mut ctx = SchedCtx {
                cfg: &self.cfg,
                mode: &mut self.mode,
                banks: &self.banks,
                arena: &self.arena,
                stats: &mut self.stats,
                cycle: arrival,
            };
            sched.add_req(rid, &mut ctx);
            rid
        }

        fn schedule(&mut self, sched: &mut FrFcfs, bank: usize, curr_row: u32) -> Option<ReqId> {
            let mut ctx = SchedCtx {
                cfg: &self.cfg,
                mode: &mut self.mode,
                banks: &self.banks,
                arena: &self.arena,
                stats: &mut self.stats,
                cycle: 100,
            };
            sched.schedule(bank, curr_row, &mut ctx)
        }

        fn update_mode(&mut self, sched: &mut FrFcfs) {
            let mut ctx = SchedCtx {
                cfg: &self.cfg,
                mode: &mut self.mode,
                banks: &self.banks,
                arena: &self.arena,
                stats: &mut self.stats,
                cycle: 100,
            };
            sched.update_mode(&mut ctx);
        }
    }

    #[test]
    fn test_row_hits_before_older_miss() {
        let cfg = MemoryConfig {
            nbk: 2,
            nbkgrp: 1,
            ..Default::default()
        };
        let mut sched = FrFcfs::new(&cfg);
        let mut fx = Fixture::new(cfg);

        // (bankA, rowX, t0), (bankA, rowY, t1), (bankA, rowX, t2); bank on rowX.
        let (d0, t0) = mem_desc(0, 0x10, 0);
        let (d1, t1) = mem_desc(0, 0x20, 1);
        let (d2, t2) = mem_desc(0, 0x10, 2);
        let r0 = fx.add(&mut sched, d0, t0);
        let r1 = fx.add(&mut sched, d1, t1);
        let r2 = fx.add(&mut sched, d2, t2);
        fx.banks[0].curr_row = 0x10;

        // Expected service order: arrivals 0, 2, 1.
        assert_eq!(fx.schedule(&mut sched, 0, 0x10), Some(r0));
        assert_eq!(fx.schedule(&mut sched, 0, 0x10), Some(r2));
        assert_eq!(fx.schedule(&mut sched, 0, 0x10), Some(r1));
        assert_eq!(fx.schedule(&mut sched, 0, 0x10), None);
        assert_eq!(fx.stats.hits_num, 2);
    }

    #[test]
    fn test_bypass_cap_forces_switch_to_pim() {
        let cfg = MemoryConfig {
            nbk: 1,
            nbkgrp: 1,
            frfcfs_cap: 8,
            ..Default::default()
        };
        let mut sched = FrFcfs::new(&cfg);
        let mut fx = Fixture::new(cfg.clone());

        // One PIM request waiting, MEM queue continuously non-empty and
        // hitting the open row, so no bank ever reads as "ready to switch".
        let pim = RequestDesc {
            chan: 0,
            bk: 0,
            row: 0x40,
            col: 0,
            is_write: false,
            is_pim: true,
            nbytes: 32,
            tag: 0,
        };
        fx.add(&mut sched, pim, 0);
        fx.banks[0].curr_row = 0x10;

        let mut switched_at = None;
        for i in 0..12u64 {
            let (d, t) = mem_desc(0, 0x10, 10 + i);
            fx.add(&mut sched, d, t);
            fx.update_mode(&mut sched);
            if fx.mode == MemoryMode::Pim {
                switched_at = Some(i);
                break;
            }
            // The open-row hit keeps bypassing the older PIM request.
            assert!(fx.schedule(&mut sched, 0, 0x10).is_some());
        }

        // After `frfcfs_cap` bypasses the switch must fire.
        assert_eq!(switched_at, Some(8));
    }

    #[test]
    fn test_switch_to_pim_when_out_of_mem() {
        let cfg = MemoryConfig {
            nbk: 2,
            nbkgrp: 1,
            ..Default::default()
        };
        let mut sched = FrFcfs::new(&cfg);
        let mut fx = Fixture::new(cfg);

        let pim = RequestDesc {
            chan: 0,
            bk: 0,
            row: 0x40,
            col: 0,
            is_write: false,
            is_pim: true,
            nbytes: 32,
            tag: 0,
        };
        fx.add(&mut sched, pim, 0);

        fx.update_mode(&mut sched);
        assert_eq!(fx.mode, MemoryMode::Pim);
        assert_eq!(fx.stats.nonpim_to_pim_switches, 1);
    }
}
