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

    sched/core.rs

    Shared scheduler state every policy composes: per-bank request queues
    with a row-keyed secondary index and a cached row cursor, the optional
    separate write queue, the PIM queue, and the row-service accounting.

*/

use std::collections::VecDeque;

use fxhash::FxHashMap;

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    request::ReqId,
    sched::SchedCtx,
    stats::ChannelStats,
};

/// What to promote on a row-buffer miss, once the cached row cursor is gone.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MissPick {
    /// The oldest waiter, whatever it is.
    OldestAny,
    /// Refuse to schedule while the oldest waiter is a PIM request (policies
    /// that thread PIM requests through the bank queues).
    SkipIfOldestPim,
    /// Step over queued PIM requests and take the oldest MEM waiter.
    OldestMem,
}

type RowBins = FxHashMap<u32, VecDeque<ReqId>>;

/// Queues are ordered newest-front / oldest-back; row bins mirror that
/// ordering per row. The `last_row` cursor caches the bin a hit streak is
/// draining so consecutive hits pop without a re-search; it is cleared when
/// the bin empties and on mode switches to PIM.
pub struct SchedulerCore {
    pub num_pending: usize,
    pub num_write_pending: usize,
    pub num_pim_pending: usize,

    pub queue: Vec<VecDeque<ReqId>>,
    pub bins: Vec<RowBins>,
    pub last_row: Vec<Option<u32>>,

    pub write_queue: Vec<VecDeque<ReqId>>,
    pub write_bins: Vec<RowBins>,
    pub last_write_row: Vec<Option<u32>>,

    pub pim_queue: VecDeque<ReqId>,

    row_service_timestamp: Vec<u64>,
}

impl SchedulerCore {
    pub fn new(cfg: &MemoryConfig) -> SchedulerCore {
        SchedulerCore {
            num_pending: 0,
            num_write_pending: 0,
            num_pim_pending: 0,
            queue: vec![VecDeque::new(); cfg.nbk],
            bins: vec![RowBins::default(); cfg.nbk],
            last_row: vec![None; cfg.nbk],
            write_queue: vec![VecDeque::new(); cfg.nbk],
            write_bins: vec![RowBins::default(); cfg.nbk],
            last_write_row: vec![None; cfg.nbk],
            pim_queue: VecDeque::new(),
            row_service_timestamp: vec![0; cfg.nbk],
        }
    }

    /// Row-transition accounting: close out the service interval of the row
    /// a bank was on and start a new one.
    fn data_collection(row_service_timestamp: &mut [u64], stats: &mut ChannelStats, bank: usize, cycle: u64) {
        if cycle > row_service_timestamp[bank] {
            let service_time = cycle - row_service_timestamp[bank];
            if service_time > stats.max_service_time_to_same_row[bank] {
                stats.max_service_time_to_same_row[bank] = service_time;
            }
        }
        row_service_timestamp[bank] = cycle;

        if stats.concurrent_row_access[bank] > stats.max_conc_access_to_same_row[bank] {
            stats.max_conc_access_to_same_row[bank] = stats.concurrent_row_access[bank];
        }
        stats.concurrent_row_access[bank] = 0;
        stats.num_activates[bank] += 1;
    }

    pub fn add_req(&mut self, rid: ReqId, ctx: &mut SchedCtx) {
        let req = ctx.arena.get(rid);
        if req.is_pim {
            assert!(
                ctx.cfg.pim_queue_size == 0 || self.num_pim_pending < ctx.cfg.pim_queue_size,
                "PIM request admitted into a full PIM queue"
            );
            self.num_pim_pending += 1;
            self.pim_queue.push_back(rid);

            if ctx.stats.first_pim_insert == 0 {
                ctx.stats.first_pim_insert = ctx.cycle;
            }
        }
        else if ctx.cfg.separate_write_queue_enabled && req.is_write() {
            assert!(
                ctx.cfg.write_queue_size == 0 || self.num_write_pending < ctx.cfg.write_queue_size,
                "write request admitted into a full write queue"
            );
            self.num_write_pending += 1;
            self.write_queue[req.bk].push_front(rid);
            self.write_bins[req.bk].entry(req.row).or_default().push_front(rid);

            if ctx.stats.first_non_pim_insert == 0 {
                ctx.stats.first_non_pim_insert = ctx.cycle;
            }
        }
        else {
            assert!(
                ctx.cfg.mem_queue_size == 0 || self.num_pending < ctx.cfg.mem_queue_size,
                "request admitted into a full MEM queue"
            );
            self.num_pending += 1;
            self.queue[req.bk].push_front(rid);
            self.bins[req.bk].entry(req.row).or_default().push_front(rid);

            if ctx.stats.first_non_pim_insert == 0 {
                ctx.stats.first_non_pim_insert = ctx.cycle;
            }
        }
    }

    /// Thread a PIM request through every bank queue (policies that arbitrate
    /// PIM in-line with MEM). `marks` is the policy's per-bank PIM marker
    /// list, ordered like the queues.
    pub fn add_pim_to_bank_queues(&mut self, rid: ReqId, marks: &mut [VecDeque<ReqId>]) {
        for bank in 0..self.queue.len() {
            self.queue[bank].push_front(rid);
            marks[bank].push_front(rid);
        }
    }

    /// Would the next request picked for `bank` hit `curr_row`? Mirrors the
    /// pick in `schedule` without disturbing the cursor. A live cursor means
    /// a hit streak is still draining.
    pub fn is_next_req_hit(&self, bank: usize, curr_row: u32, mode: MemoryMode, cfg: &MemoryConfig) -> bool {
        let write_path = mode == MemoryMode::Write && cfg.separate_write_queue_enabled;
        let (queue, bins, last_row) = if write_path {
            (&self.write_queue, &self.write_bins, &self.last_write_row)
        }
        else {
            (&self.queue, &self.bins, &self.last_row)
        };

        if last_row[bank].is_none() {
            if queue[bank].is_empty() {
                return false;
            }
            bins[bank].contains_key(&curr_row)
        }
        else {
            true
        }
    }

    /// FR-FCFS pick: (1) open-row hit, (2) oldest per `miss`. Performs the
    /// row-locality and per-bank accounting and releases the request from
    /// the policy queues.
    pub fn schedule(&mut self, bank: usize, curr_row: u32, miss: MissPick, ctx: &mut SchedCtx) -> Option<ReqId> {
        let write_path = *ctx.mode == MemoryMode::Write && ctx.cfg.separate_write_queue_enabled;

        let SchedulerCore {
            queue,
            bins,
            last_row,
            write_queue,
            write_bins,
            last_write_row,
            row_service_timestamp,
            num_pending,
            num_write_pending,
            ..
        } = self;

        let (queue, bins, last_row) = if write_path {
            (write_queue, write_bins, last_write_row)
        }
        else {
            (queue, bins, last_row)
        };

        let mut rowhit = true;
        if last_row[bank].is_none() {
            if queue[bank].is_empty() {
                return None;
            }

            if bins[bank].contains_key(&curr_row) {
                last_row[bank] = Some(curr_row);
            }
            else {
                let oldest = match miss {
                    MissPick::OldestAny => *queue[bank].back().unwrap(),
                    MissPick::SkipIfOldestPim => {
                        let rid = *queue[bank].back().unwrap();
                        if ctx.arena.get(rid).is_pim {
                            return None;
                        }
                        rid
                    }
                    MissPick::OldestMem => {
                        let rid = *queue[bank].back().unwrap();
                        if ctx.arena.get(rid).is_pim {
                            match queue[bank].iter().rev().find(|&&r| !ctx.arena.get(r).is_pim) {
                                Some(&r) => r,
                                None => return None,
                            }
                        }
                        else {
                            rid
                        }
                    }
                };
                let row = ctx.arena.get(oldest).row;
                debug_assert!(bins[bank].contains_key(&row), "queued request missing from row bins");
                last_row[bank] = Some(row);
                Self::data_collection(row_service_timestamp, ctx.stats, bank, ctx.cycle);
                rowhit = false;
            }
        }

        let row = last_row[bank].unwrap();
        let bin = bins[bank].get_mut(&row).expect("cursor points at a missing row bin");
        let rid = bin.pop_back().expect("cursor points at an empty row bin");
        let pos = queue[bank]
            .iter()
            .rposition(|&x| x == rid)
            .expect("scheduled request missing from bank queue");
        queue[bank].remove(pos);
        if bin.is_empty() {
            bins[bank].remove(&row);
            last_row[bank] = None;
        }

        let req = ctx.arena.get(rid);
        ctx.stats.access_num += 1;
        if req.is_write() {
            ctx.stats.write_num += 1;
        }
        else {
            ctx.stats.read_num += 1;
        }
        if rowhit {
            ctx.stats.hits_num += 1;
            if req.is_write() {
                ctx.stats.hits_write_num += 1;
            }
            else {
                ctx.stats.hits_read_num += 1;
            }
        }
        ctx.stats.concurrent_row_access[bank] += 1;
        ctx.stats.row_access[bank] += 1;

        if ctx.cfg.separate_write_queue_enabled && req.is_write() {
            debug_assert!(*num_write_pending > 0);
            *num_write_pending -= 1;
        }
        else {
            debug_assert!(*num_pending > 0);
            *num_pending -= 1;
        }

        Some(rid)
    }

    /// PIM pick from the dedicated PIM queue, in strict arrival order.
    /// Row-hit accounting applies to every bank.
    pub fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        if self.num_pim_pending == 0 {
            return None;
        }

        let rid = self.pim_queue.pop_front().expect("pim_queue empty with pending count nonzero");
        self.num_pim_pending -= 1;

        let row = ctx.arena.get(rid).row;
        ctx.stats.access_num += 1;
        ctx.stats.pim_num += 1;

        for bank in 0..ctx.banks.len() {
            if ctx.banks[bank].curr_row == row {
                ctx.stats.hits_num += 1;
                ctx.stats.hits_pim_num += 1;
            }
            else {
                Self::data_collection(&mut self.row_service_timestamp, ctx.stats, bank, ctx.cycle);
            }

            ctx.stats.concurrent_row_access[bank] += 1;
            ctx.stats.row_access[bank] += 1;
        }

        Some(rid)
    }

    /// PIM pick for policies that thread PIM requests through the bank
    /// queues: consumes the oldest marker from every bank.
    pub fn schedule_pim_from_bank_queues(&mut self, marks: &mut [VecDeque<ReqId>], ctx: &mut SchedCtx) -> Option<ReqId> {
        if marks[0].is_empty() {
            return None;
        }

        let rid = *marks[0].back().unwrap();
        let row = ctx.arena.get(rid).row;

        for bank in 0..ctx.banks.len() {
            let bank_rid = *marks[bank].back().expect("PIM marker lists out of sync");
            debug_assert_eq!(bank_rid, rid, "banks disagree on the oldest PIM request");

            if ctx.banks[bank].curr_row == row {
                ctx.stats.hits_num += 1;
                ctx.stats.hits_pim_num += 1;
            }
            else {
                Self::data_collection(&mut self.row_service_timestamp, ctx.stats, bank, ctx.cycle);
            }

            ctx.stats.access_num += 1;
            ctx.stats.pim_num += 1;
            ctx.stats.concurrent_row_access[bank] += 1;
            ctx.stats.row_access[bank] += 1;

            let pos = self.queue[bank]
                .iter()
                .rposition(|&x| x == rid)
                .expect("PIM request missing from bank queue");
            self.queue[bank].remove(pos);
            marks[bank].pop_back();
        }

        debug_assert!(self.num_pim_pending > 0);
        self.num_pim_pending -= 1;

        Some(rid)
    }

    /// Baseline READ/WRITE flip on the separate write queue watermarks.
    pub fn update_rw_mode(&self, ctx: &mut SchedCtx) {
        if *ctx.mode == MemoryMode::Pim || !ctx.cfg.separate_write_queue_enabled {
            return;
        }

        let have_reads = self.num_pending > 0;
        let have_writes = self.num_write_pending > 0;

        if *ctx.mode == MemoryMode::Read
            && (self.num_write_pending >= ctx.cfg.write_high_watermark || (!have_reads && have_writes))
        {
            *ctx.mode = MemoryMode::Write;
        }
        else if *ctx.mode == MemoryMode::Write
            && (self.num_write_pending < ctx.cfg.write_low_watermark || (have_reads && !have_writes))
        {
            *ctx.mode = MemoryMode::Read;
        }
    }

    /// Invalidate the row-hit cursors. Called on mode switches to PIM so a
    /// stale streak is not mistaken for a hit afterwards.
    pub fn clear_cursors(&mut self) {
        self.last_row.iter_mut().for_each(|c| *c = None);
        self.last_write_row.iter_mut().for_each(|c| *c = None);
    }

    pub fn have_queued_reads(&self) -> bool {
        self.queue.iter().any(|q| !q.is_empty())
    }

    pub fn have_queued_writes(&self, cfg: &MemoryConfig) -> bool {
        cfg.separate_write_queue_enabled && self.write_queue.iter().any(|q| !q.is_empty())
    }

    /// Oldest waiter in a bank's MEM queue.
    pub fn queue_oldest(&self, bank: usize) -> Option<ReqId> {
        self.queue[bank].back().copied()
    }

    /// Oldest waiter in the dedicated PIM queue.
    pub fn pim_oldest(&self) -> Option<ReqId> {
        self.pim_queue.front().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bank::Bank,
        request::{Req, ReqArena, RequestDesc},
        stats::ChannelStats,
    };

    fn write_cfg() -> MemoryConfig {
        MemoryConfig {
            nbk: 2,
            nbkgrp: 1,
            separate_write_queue_enabled: true,
            write_high_watermark: 3,
            write_low_watermark: 1,
            ..Default::default()
        }
    }

    fn push(core: &mut SchedulerCore, cfg: &MemoryConfig, arena: &mut ReqArena, stats: &mut ChannelStats, bk: usize, row: u32, is_write: bool) {
        let desc = RequestDesc {
            chan: 0,
            bk,
            row,
            col: 0,
            is_write,
            is_pim: false,
            nbytes: 32,
            tag: 0,
        };
        let rid = arena.insert(Req::new(&desc, cfg.nbk, cfg.nbkgrp, cfg.bank_index_policy, cfg.bankgrp_index_policy, 0));
        let banks = vec![Bank::new(0); cfg.nbk];
        let mut mode = MemoryMode::Read;
        let mut ctx = SchedCtx {
            cfg,
            mode: &mut mode,
            banks: &banks,
            arena,
            stats,
            cycle: 0,
        };
        core.add_req(rid, &mut ctx);
    }

    #[test]
    fn test_write_watermarks_flip_mode() {
        let cfg = write_cfg();
        let mut core = SchedulerCore::new(&cfg);
        let mut arena = ReqArena::new();
        let mut stats = ChannelStats::new(cfg.nbk);
        let banks = vec![Bank::new(0); cfg.nbk];

        push(&mut core, &cfg, &mut arena, &mut stats, 0, 1, false);
        for row in 0..3 {
            push(&mut core, &cfg, &mut arena, &mut stats, 0, row, true);
        }
        assert_eq!(core.num_pending, 1);
        assert_eq!(core.num_write_pending, 3);

        // High watermark reached: READ flips to WRITE.
        let mut mode = MemoryMode::Read;
        {
            let mut ctx = SchedCtx {
                cfg: &cfg,
                mode: &mut mode,
                banks: &banks,
                arena: &arena,
                stats: &mut stats,
                cycle: 0,
            };
            core.update_rw_mode(&mut ctx);
        }
        assert_eq!(mode, MemoryMode::Write);

        // Drain writes below the low watermark: WRITE flips back to READ.
        {
            let mut ctx = SchedCtx {
                cfg: &cfg,
                mode: &mut mode,
                banks: &banks,
                arena: &arena,
                stats: &mut stats,
                cycle: 1,
            };
            for _ in 0..3 {
                core.schedule(0, 0, MissPick::OldestAny, &mut ctx).expect("write pending");
            }
        }
        assert_eq!(core.num_write_pending, 0);
        {
            let mut ctx = SchedCtx {
                cfg: &cfg,
                mode: &mut mode,
                banks: &banks,
                arena: &arena,
                stats: &mut stats,
                cycle: 2,
            };
            core.update_rw_mode(&mut ctx);
        }
        assert_eq!(mode, MemoryMode::Read);
    }

    #[test]
    fn test_next_req_hit_probe_matches_pick() {
        let cfg = MemoryConfig {
            nbk: 1,
            nbkgrp: 1,
            ..Default::default()
        };
        let mut core = SchedulerCore::new(&cfg);
        let mut arena = ReqArena::new();
        let mut stats = ChannelStats::new(cfg.nbk);

        assert!(!core.is_next_req_hit(0, 5, MemoryMode::Read, &cfg));

        push(&mut core, &cfg, &mut arena, &mut stats, 0, 5, false);
        assert!(core.is_next_req_hit(0, 5, MemoryMode::Read, &cfg));
        assert!(!core.is_next_req_hit(0, 6, MemoryMode::Read, &cfg));
    }
}
