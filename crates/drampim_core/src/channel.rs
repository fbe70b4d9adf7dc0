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

    channel.rs

    The per-channel DRAM controller: request admission, the per-cycle state
    machine driving activate/precharge/column commands under the DDR timing
    constraints, MEM/PIM mode arbitration, collective PIM command issue, and
    the data-bus return pipeline.

*/

use std::collections::VecDeque;

use crate::{
    bank::{dec_to_zero, Bank, BankGroup, BankState},
    config::{ConfigError, MemoryConfig},
    pipeline::{DelayPipeline, ReturnQueue},
    request::{bankgrp_index, AccessDir, Req, ReqArena, ReqId, RequestDesc},
    sched::{SchedCtx, SchedulerKind, SchedulerPolicy},
    stats::{ChannelStats, PartialSample},
};

/// Fallback bound for the return queue when the configured size is 0.
pub const DEFAULT_RETURN_QUEUE_SIZE: usize = 1024;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MemoryMode {
    #[default]
    Read,
    Write,
    Pim,
}

pub struct DramChannel {
    id: usize,
    cfg: MemoryConfig,

    mode: MemoryMode,
    prio: usize,
    dram_cycle: u64,

    banks: Vec<Bank>,
    groups: Vec<BankGroup>,

    // Cross-bank timing counters.
    rrd: u32,
    ccd: u32,
    rtw: u32,
    wtr: u32,

    /// Direction of the last column burst; flips re-time the data bus for
    /// the turnaround penalty.
    bus_dir: AccessDir,

    arena: ReqArena,
    mrqq: VecDeque<ReqId>,
    rwq: DelayPipeline<ReqId>,
    returnq: ReturnQueue<Req>,

    scheduler: Option<SchedulerKind>,

    // Occupancy counters for the FIFO path.
    num_pending: usize,
    num_pim_pending: usize,

    last_mem_insert_cycle: u64,
    last_pim_insert_cycle: u64,

    stats: ChannelStats,

    #[cfg(feature = "verify")]
    mem_rows: fxhash::FxHashSet<u32>,
    #[cfg(feature = "verify")]
    pim_rows: fxhash::FxHashSet<u32>,
}

impl DramChannel {
    pub fn new(id: usize, cfg: MemoryConfig) -> Result<DramChannel, ConfigError> {
        cfg.validate()?;

        let banks = (0..cfg.nbk)
            .map(|i| Bank::new(bankgrp_index(i, cfg.nbk, cfg.nbkgrp, cfg.bankgrp_index_policy)))
            .collect();
        let groups = vec![BankGroup::default(); cfg.nbkgrp];

        let returnq_size = if cfg.return_queue_size == 0 {
            DEFAULT_RETURN_QUEUE_SIZE
        }
        else {
            cfg.return_queue_size
        };

        let scheduler = SchedulerKind::create(&cfg);
        let stats = ChannelStats::new(cfg.nbk);
        let rwq = DelayPipeline::new(cfg.cl, cfg.cl as usize + 1);

        Ok(DramChannel {
            id,
            cfg,
            mode: MemoryMode::Read,
            prio: 0,
            dram_cycle: 0,
            banks,
            groups,
            rrd: 0,
            ccd: 0,
            rtw: 0,
            wtr: 0,
            bus_dir: AccessDir::Read,
            arena: ReqArena::new(),
            mrqq: VecDeque::new(),
            rwq,
            returnq: ReturnQueue::new(returnq_size),
            scheduler,
            num_pending: 0,
            num_pim_pending: 0,
            last_mem_insert_cycle: 0,
            last_pim_insert_cycle: 0,
            stats,
            #[cfg(feature = "verify")]
            mem_rows: fxhash::FxHashSet::default(),
            #[cfg(feature = "verify")]
            pim_rows: fxhash::FxHashSet::default(),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.cfg
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn mode(&self) -> MemoryMode {
        self.mode
    }

    /// Queue-full test selecting the PIM, separate-write, or MEM bound.
    /// Callers must check this before `push`; a bound of 0 is unlimited.
    pub fn full(&self, is_write: bool, is_pim: bool) -> bool {
        match &self.scheduler {
            None => {
                if is_pim {
                    self.cfg.pim_queue_size != 0 && self.num_pim_pending >= self.cfg.pim_queue_size
                }
                else {
                    self.cfg.mem_queue_size != 0 && self.num_pending >= self.cfg.mem_queue_size
                }
            }
            Some(sched) => {
                if self.cfg.mem_queue_size == 0 {
                    false
                }
                else if is_pim {
                    sched.core().num_pim_pending >= self.cfg.pim_queue_size
                }
                else if is_write && self.cfg.separate_write_queue_enabled {
                    sched.core().num_write_pending >= self.cfg.write_queue_size
                }
                else {
                    sched.core().num_pending >= self.cfg.mem_queue_size
                }
            }
        }
    }

    /// Aggregate pending depth for interconnect backpressure.
    pub fn que_length(&self) -> usize {
        match &self.scheduler {
            None => self.mrqq.len(),
            Some(sched) => sched.core().num_pending,
        }
    }

    pub fn queue_limit(&self) -> usize {
        self.cfg.mem_queue_size
    }

    pub fn returnq_full(&self) -> bool {
        self.returnq.full()
    }

    pub fn returnq_top(&self) -> Option<&Req> {
        self.returnq.top()
    }

    pub fn returnq_pop(&mut self) -> Option<Req> {
        self.returnq.pop()
    }

    /// Admit a decoded request. The caller must have checked `full`.
    pub fn push(&mut self, desc: RequestDesc) {
        assert_eq!(desc.chan, self.id, "request routed to the wrong channel controller");
        debug_assert!(
            !desc.is_pim || desc.nbytes <= self.cfg.atom_size,
            "a PIM request transfers a single atom"
        );

        let req = Req::new(
            &desc,
            self.cfg.nbk,
            self.cfg.nbkgrp,
            self.cfg.bank_index_policy,
            self.cfg.bankgrp_index_policy,
            self.dram_cycle,
        );

        #[cfg(feature = "verify")]
        {
            if req.is_pim {
                self.pim_rows.insert(req.row);
                assert!(!self.mem_rows.contains(&req.row), "PIM and MEM rows must stay disjoint");
            }
            else {
                self.mem_rows.insert(req.row);
                assert!(!self.pim_rows.contains(&req.row), "PIM and MEM rows must stay disjoint");
            }
        }

        let is_pim = req.is_pim;
        let rid = self.arena.insert(req);
        self.mrqq.push_back(rid);

        if is_pim {
            if self.last_pim_insert_cycle > 0 {
                self.stats.pim_arrival_interval.push(self.dram_cycle - self.last_pim_insert_cycle);
            }
            self.last_pim_insert_cycle = self.dram_cycle;

            self.stats.n_pim += 1;
            if self.scheduler.is_none() {
                self.num_pim_pending += 1;
            }
        }
        else {
            if self.last_mem_insert_cycle > 0 {
                self.stats.mem_arrival_interval.push(self.dram_cycle - self.last_mem_insert_cycle);
            }
            self.last_mem_insert_cycle = self.dram_cycle;

            if self.scheduler.is_none() {
                self.num_pending += 1;
            }
            self.stats.phases.on_mem_arrival();
        }

        self.stats.n_req += 1;
        self.stats.n_req_partial += 1;

        let (nreqs, npim) = self.pending_counts();
        if nreqs as u64 > self.stats.max_mrqs {
            self.stats.max_mrqs = nreqs as u64;
        }
        if npim as u64 > self.stats.max_pim_mrqs {
            self.stats.max_pim_mrqs = npim as u64;
        }
    }

    fn pending_counts(&self) -> (usize, usize) {
        match &self.scheduler {
            None => (self.mrqq.len(), self.num_pim_pending),
            Some(sched) => {
                let core = sched.core();
                (
                    core.num_pending + core.num_write_pending + core.num_pim_pending,
                    core.num_pim_pending,
                )
            }
        }
    }

    /// Advance the channel exactly one cycle.
    pub fn cycle(&mut self) {
        self.drain_return_pipeline();

        if self.scheduler.is_some() {
            self.scheduler_policy();
        }
        else {
            self.scheduler_fifo();
        }

        // Occupancy aggregates.
        let (nreqs, npim) = self.pending_counts();
        self.stats.ave_mrqs += nreqs as u64;
        self.stats.ave_mrqs_partial += nreqs as u64;
        self.stats.ave_pim_mrqs += npim as u64;
        self.stats.ave_pim_mrqs_partial += npim as u64;
        if nreqs as u64 > self.stats.max_mrqs {
            self.stats.max_mrqs = nreqs as u64;
        }
        if npim as u64 > self.stats.max_pim_mrqs {
            self.stats.max_pim_mrqs = npim as u64;
        }

        self.collect_blp_stats();

        let in_pim_window = self
            .banks
            .iter()
            .any(|b| b.mrq.map(|rid| self.arena.get(rid).is_pim).unwrap_or(false));

        let mut issued_col_cmd = false;
        let mut issued_row_cmd = false;
        let mut still_busy = self.cfg.nbk;

        if in_pim_window {
            issued_col_cmd = self.issue_pim_col_command();
            issued_row_cmd = self.issue_pim_row_command();
        }
        else if self.cfg.dual_bus_interface {
            // One row and one column command per cycle; the pending hit on
            // the column bus always goes first.
            for i in 0..self.cfg.nbk {
                let j = (i + self.prio) % self.cfg.nbk;
                issued_col_cmd = self.issue_col_command(j);
                if issued_col_cmd {
                    break;
                }
            }
            for i in 0..self.cfg.nbk {
                let j = (i + self.prio) % self.cfg.nbk;
                issued_row_cmd = self.issue_row_command(j);
                if issued_row_cmd {
                    break;
                }
            }
            still_busy = self.idle_bank_tally(still_busy);
        }
        else {
            // Single bus: one command of either kind.
            for i in 0..self.cfg.nbk {
                let j = (i + self.prio) % self.cfg.nbk;
                if !issued_col_cmd {
                    issued_col_cmd = self.issue_col_command(j);
                }
                if !issued_col_cmd && !issued_row_cmd {
                    issued_row_cmd = self.issue_row_command(j);
                }
            }
            still_busy = self.idle_bank_tally(still_busy);
        }

        let issued = issued_col_cmd || issued_row_cmd;
        if !issued {
            self.stats.n_nop += 1;
            self.stats.n_nop_partial += 1;
        }
        if still_busy > 0 {
            self.stats.n_activity += 1;
            self.stats.n_activity_partial += 1;
        }
        self.stats.n_cmd += 1;
        self.stats.n_cmd_partial += 1;
        if issued {
            self.stats.issued_total += 1;
            if issued_col_cmd && issued_row_cmd {
                self.stats.issued_two += 1;
            }
        }
        if issued_col_cmd {
            self.stats.issued_total_col += 1;
        }
        if issued_row_cmd {
            self.stats.issued_total_row += 1;
        }

        self.classify_bandwidth(issued_col_cmd);

        // End of cycle: the clock advances and every countdown steps once.
        self.dram_cycle += 1;
        dec_to_zero(&mut self.rrd);
        dec_to_zero(&mut self.ccd);
        dec_to_zero(&mut self.rtw);
        dec_to_zero(&mut self.wtr);
        for bank in self.banks.iter_mut() {
            bank.tick();
        }
        for group in self.groups.iter_mut() {
            group.tick();
        }

        self.stats.phases.advance(self.dram_cycle);
    }

    /// Produce the end-of-run report, including the active policy's extended
    /// statistics.
    pub fn report(&self) -> String {
        let extra = self.scheduler.as_ref().and_then(|s| s.extended_stats(&self.cfg));
        self.stats.report(self.id, &self.banks, extra.as_deref())
    }

    /// Drain the sampling-interval counters for periodic charting.
    pub fn sample_partial(&mut self) -> PartialSample {
        self.stats.sample_partial()
    }

    /// Step 1 of the cycle: one finished burst may leave the data bus and,
    /// once the last byte of its request has transferred, turn into a reply
    /// (reads, PIM) or be released (writebacks).
    fn drain_return_pipeline(&mut self) {
        if self.returnq.full() {
            return;
        }

        if let Some(rid) = self.rwq.pop(self.dram_cycle) {
            let req = self.arena.get_mut(rid);
            req.dqbytes += self.cfg.atom_size;

            if req.dqbytes >= req.nbytes {
                let req = self.arena.remove(rid);
                if req.is_pim {
                    self.stats.last_pim_finish = self.dram_cycle;
                }
                else {
                    self.stats.last_non_pim_finish = self.dram_cycle;
                }

                if req.is_write() && !req.is_pim {
                    // Writeback: acknowledged and dropped.
                    log::trace!("ch{}: writeback done bk:{} row:{:03x}", self.id, req.bk, req.row);
                }
                else {
                    log::trace!("ch{}: reply bk:{} row:{:03x} tag:{}", self.id, req.bk, req.row, req.tag);
                    self.returnq.push(req);
                }
            }
        }
    }

    /// Head-of-line drain of the admission queue (no policy state). A PIM
    /// request at the head waits for every bank to free up, then occupies
    /// all of them at once.
    fn scheduler_fifo(&mut self) {
        let Some(&head) = self.mrqq.front() else {
            return;
        };

        let mut request_issued = false;
        let (head_is_pim, head_row, head_bk, head_is_write) = {
            let req = self.arena.get(head);
            (req.is_pim, req.row, req.bk, req.is_write())
        };

        if head_is_pim {
            if self.stats.first_pim_insert == 0 {
                self.stats.first_pim_insert = self.dram_cycle;
            }

            let mut can_schedule = true;
            for bank in self.banks.iter() {
                if let Some(rid) = bank.mrq {
                    can_schedule = false;
                    if !self.arena.get(rid).is_pim {
                        self.stats.nonpim_to_pim_switch_latency += 1;
                    }
                    break;
                }
            }

            if can_schedule {
                self.mrqq.pop_front();
                for bank in self.banks.iter_mut() {
                    self.stats.access_num += 1;
                    self.stats.pim_num += 1;
                    if bank.curr_row == head_row {
                        self.stats.hits_num += 1;
                        self.stats.hits_pim_num += 1;
                    }
                    bank.mrq = Some(head);
                }

                self.num_pim_pending -= 1;
                request_issued = true;
            }

            if self.mode != MemoryMode::Pim {
                self.stats.nonpim_to_pim_switches += 1;

                // Count row-buffer hits that the switch is about to destroy:
                // the first waiting MEM request per bank, against the rows
                // currently open.
                let mut first_req_found = vec![false; self.cfg.nbk];
                let mut num_found = 0;
                for &rid in self.mrqq.iter() {
                    if num_found >= self.cfg.nbk {
                        break;
                    }
                    let req = self.arena.get(rid);
                    if !first_req_found[req.bk] && !req.is_pim {
                        if self.banks[req.bk].curr_row == req.row {
                            self.stats.nonpim_to_pim_switch_conflicts += 1;
                        }
                        first_req_found[req.bk] = true;
                        num_found += 1;
                    }
                }
            }

            self.mode = MemoryMode::Pim;
            self.stats.non_pim_queueing_delay += 1;
        }
        else {
            if self.stats.first_non_pim_insert == 0 {
                self.stats.first_non_pim_insert = self.dram_cycle;
            }

            if self.banks[head_bk].mrq.is_none() {
                self.stats.access_num += 1;
                if head_is_write {
                    self.stats.write_num += 1;
                }
                else {
                    self.stats.read_num += 1;
                }

                if self.banks[head_bk].curr_row == head_row {
                    self.stats.hits_num += 1;
                    if head_is_write {
                        self.stats.hits_write_num += 1;
                    }
                    else {
                        self.stats.hits_read_num += 1;
                    }
                }

                self.mrqq.pop_front();
                self.banks[head_bk].mrq = Some(head);
                self.num_pending -= 1;
                request_issued = true;
            }

            if self.mode == MemoryMode::Pim {
                self.stats.pim_to_nonpim_switches += 1;
            }
            self.mode = MemoryMode::Read;
            self.stats.pim_queueing_delay += 1;
        }

        if request_issued {
            self.record_dispatch_latency(head);
        }
    }

    /// Policy path: drain fresh arrivals into the policy queues, let the
    /// policy arbitrate the mode, then dispatch one MEM request to an idle
    /// bank (round-robin from `prio`) or one PIM request to every bank.
    fn scheduler_policy(&mut self) {
        let mut sched = self.scheduler.take().expect("policy path without a scheduler");

        while let Some(rid) = self.mrqq.pop_front() {
            let mut ctx = SchedCtx {
                cfg: &self.cfg,
                mode: &mut self.mode,
                banks: &self.banks,
                arena: &self.arena,
                stats: &mut self.stats,
                cycle: self.dram_cycle,
            };
            sched.add_req(rid, &mut ctx);
        }

        let prev_mode = self.mode;
        {
            let mut ctx = SchedCtx {
                cfg: &self.cfg,
                mode: &mut self.mode,
                banks: &self.banks,
                arena: &self.arena,
                stats: &mut self.stats,
                cycle: self.dram_cycle,
            };
            sched.update_mode(&mut ctx);
        }

        if prev_mode != MemoryMode::Pim && self.mode == MemoryMode::Pim {
            // Row-buffer hits lost to the switch are a statistic, never an
            // error; stale hit streaks must not survive it.
            for (b, bank) in self.banks.iter().enumerate() {
                if sched.core().is_next_req_hit(b, bank.curr_row, prev_mode, &self.cfg) {
                    self.stats.nonpim_to_pim_switch_conflicts += 1;
                }
            }
            sched.core_mut().clear_cursors();
        }

        let mut dispatched = None;

        if self.mode == MemoryMode::Pim {
            let mut can_schedule = true;
            let mut waiting_for_nonpim = false;
            for bank in self.banks.iter() {
                if let Some(rid) = bank.mrq {
                    can_schedule = false;
                    waiting_for_nonpim = waiting_for_nonpim || !self.arena.get(rid).is_pim;
                    break;
                }
            }

            if waiting_for_nonpim {
                self.stats.nonpim_to_pim_switch_latency += 1;
            }

            if can_schedule {
                let rid = {
                    let mut ctx = SchedCtx {
                        cfg: &self.cfg,
                        mode: &mut self.mode,
                        banks: &self.banks,
                        arena: &self.arena,
                        stats: &mut self.stats,
                        cycle: self.dram_cycle,
                    };
                    sched.schedule_pim(&mut ctx)
                };

                if let Some(rid) = rid {
                    for bank in self.banks.iter_mut() {
                        bank.mrq = Some(rid);
                    }
                    dispatched = Some(rid);
                }
            }

            if sched.core().num_pending + sched.core().num_write_pending > 0 {
                self.stats.non_pim_queueing_delay += 1;
            }
        }
        else {
            for i in 0..self.cfg.nbk {
                let b = (i + self.prio) % self.cfg.nbk;
                if self.banks[b].mrq.is_some() {
                    continue;
                }

                let curr_row = self.banks[b].curr_row;
                let rid = {
                    let mut ctx = SchedCtx {
                        cfg: &self.cfg,
                        mode: &mut self.mode,
                        banks: &self.banks,
                        arena: &self.arena,
                        stats: &mut self.stats,
                        cycle: self.dram_cycle,
                    };
                    sched.schedule(b, curr_row, &mut ctx)
                };

                if let Some(rid) = rid {
                    self.prio = (self.prio + 1) % self.cfg.nbk;
                    self.banks[b].mrq = Some(rid);
                    dispatched = Some(rid);
                    break;
                }
            }

            if sched.core().num_pim_pending > 0 {
                self.stats.pim_queueing_delay += 1;
            }
        }

        self.scheduler = Some(sched);

        if let Some(rid) = dispatched {
            self.record_dispatch_latency(rid);
        }
    }

    fn record_dispatch_latency(&mut self, rid: ReqId) {
        let req = self.arena.get_mut(rid);
        let latency = self.dram_cycle - req.timestamp;

        self.stats.mrq_latency.push(latency);
        if req.is_pim {
            self.stats.pim_mrq_latency.push(latency);
        }
        else {
            self.stats.mem_mrq_latency.push(latency);
        }

        req.timestamp = self.dram_cycle;
    }

    fn record_service_latency(&mut self, rid: ReqId) {
        let req = self.arena.get(rid);
        let latency = self.dram_cycle - req.timestamp;

        self.stats.service_latency.push(latency);
        if req.is_pim {
            self.stats.pim_service_latency.push(latency);
        }
        else {
            self.stats.mem_service_latency.push(latency);
        }
    }

    /// Attempt one column command on bank `j`.
    fn issue_col_command(&mut self, j: usize) -> bool {
        let Some(rid) = self.banks[j].mrq else {
            return false;
        };
        let grp = self.banks[j].grp;
        let (row, dir, nbytes) = {
            let req = self.arena.get(rid);
            (req.row, req.rw, req.nbytes)
        };

        let bank = &self.banks[j];
        let row_open = bank.state == BankState::Active && bank.curr_row == row;

        let can_read = dir == AccessDir::Read
            && self.ccd == 0
            && bank.rcd == 0
            && self.groups[grp].ccdl == 0
            && self.wtr == 0
            && row_open
            && !self.rwq.full();
        let can_write = dir == AccessDir::Write
            && self.ccd == 0
            && bank.rcdwr == 0
            && self.groups[grp].ccdl == 0
            && self.rtw == 0
            && row_open
            && !self.rwq.full();

        if can_read {
            if self.bus_dir == AccessDir::Write {
                self.bus_dir = AccessDir::Read;
                self.rwq.set_latency(self.cfg.cl);
            }
            self.rwq.push(rid, self.dram_cycle);

            self.arena.get_mut(rid).txbytes += self.cfg.atom_size;
            self.ccd = self.cfg.t_ccd;
            self.groups[grp].ccdl = self.cfg.t_ccdl;
            self.rtw = self.cfg.t_rtw;
            self.banks[j].rtp = self.cfg.burst_cycles();
            self.groups[grp].rtpl = self.cfg.t_rtpl;

            self.stats.n_rd += 1;
            self.stats.bwutil += self.cfg.burst_cycles() as u64;
            self.stats.bwutil_partial += self.cfg.burst_cycles() as u64;
            self.banks[j].n_access += 1;
            self.prio = (j + 1) % self.cfg.nbk;

            let req = self.arena.get(rid);
            log::trace!(
                "ch{}: RD bk:{} row:{:03x} col:{:03x}",
                self.id,
                j,
                row,
                req.col + req.txbytes - self.cfg.atom_size
            );

            if self.arena.get(rid).txbytes >= nbytes {
                self.record_service_latency(rid);
                self.banks[j].mrq = None;
            }
            true
        }
        else if can_write {
            if self.bus_dir == AccessDir::Read {
                self.bus_dir = AccessDir::Write;
                self.rwq.set_latency(self.cfg.wl);
            }
            self.rwq.push(rid, self.dram_cycle);

            self.arena.get_mut(rid).txbytes += self.cfg.atom_size;
            self.ccd = self.cfg.t_ccd;
            self.groups[grp].ccdl = self.cfg.t_ccdl;
            self.wtr = self.cfg.t_wtr;
            self.banks[j].wtp = self.cfg.t_wtp;

            self.stats.n_wr += 1;
            self.stats.bwutil += self.cfg.burst_cycles() as u64;
            self.stats.bwutil_partial += self.cfg.burst_cycles() as u64;
            self.banks[j].n_access += 1;
            self.banks[j].n_writes += 1;
            self.prio = (j + 1) % self.cfg.nbk;

            let req = self.arena.get(rid);
            log::trace!(
                "ch{}: WR bk:{} row:{:03x} col:{:03x}",
                self.id,
                j,
                row,
                req.col + req.txbytes - self.cfg.atom_size
            );

            if self.arena.get(rid).txbytes >= nbytes {
                self.record_service_latency(rid);
                self.banks[j].mrq = None;
            }
            true
        }
        else {
            false
        }
    }

    /// Attempt one row command (ACT or PRE) on bank `j`.
    fn issue_row_command(&mut self, j: usize) -> bool {
        let Some(rid) = self.banks[j].mrq else {
            return false;
        };
        let grp = self.banks[j].grp;
        let row = self.arena.get(rid).row;

        let bank = &self.banks[j];
        if self.rrd == 0 && bank.state == BankState::Idle && bank.rp == 0 && bank.rc == 0 {
            log::trace!("ch{}: ACT bk:{} row:{:03x} from:{:03x}", self.id, j, row, bank.curr_row);

            let bank = &mut self.banks[j];
            bank.curr_row = row;
            bank.state = BankState::Active;
            bank.rcd = self.cfg.t_rcd;
            bank.rcdwr = self.cfg.t_rcdwr;
            bank.ras = self.cfg.t_ras;
            bank.rc = self.cfg.t_rc;
            self.rrd = self.cfg.t_rrd;

            self.prio = (j + 1) % self.cfg.nbk;
            self.stats.n_act += 1;
            self.stats.n_act_partial += 1;
            true
        }
        else if bank.state == BankState::Active
            && bank.curr_row != row
            && bank.ras == 0
            && bank.wtp == 0
            && bank.rtp == 0
            && self.groups[grp].rtpl == 0
        {
            log::trace!("ch{}: PRE bk:{} row:{:03x}", self.id, j, bank.curr_row);

            let bank = &mut self.banks[j];
            bank.state = BankState::Idle;
            bank.rp = self.cfg.t_rp;

            self.prio = (j + 1) % self.cfg.nbk;
            self.stats.n_pre += 1;
            self.stats.n_pre_partial += 1;
            true
        }
        else {
            false
        }
    }

    /// Collective PIM column command: fires only when every bank satisfies
    /// the write-column preconditions at once, and is the only successful
    /// exit from the PIM issue window.
    fn issue_pim_col_command(&mut self) -> bool {
        let mut can_issue = true;

        for j in 0..self.cfg.nbk {
            let grp = self.banks[j].grp;
            let bank = &self.banks[j];

            let ok = match bank.mrq {
                None => false,
                Some(rid) => {
                    let req = self.arena.get(rid);
                    self.ccd == 0
                        && bank.rcdwr == 0
                        && self.groups[grp].ccdl == 0
                        && bank.curr_row == req.row
                        && req.rw == AccessDir::Write
                        && self.rtw == 0
                        && bank.state == BankState::Active
                        && !self.rwq.full()
                }
            };

            can_issue = can_issue && ok;
            if !can_issue {
                break;
            }
        }

        if can_issue {
            let rid = self.banks[0].mrq.expect("PIM window with an empty bank");
            debug_assert!(
                self.banks.iter().all(|b| b.mrq == Some(rid)),
                "banks disagree on the PIM request"
            );

            if self.bus_dir == AccessDir::Read {
                self.bus_dir = AccessDir::Write;
                self.rwq.set_latency(self.cfg.wl);
            }
            self.rwq.push(rid, self.dram_cycle);

            self.record_service_latency(rid);

            for j in 0..self.cfg.nbk {
                let grp = self.banks[j].grp;
                self.arena.get_mut(rid).txbytes += self.cfg.atom_size;
                self.groups[grp].ccdl = self.cfg.t_ccdl;
                self.banks[j].wtp = self.cfg.t_wtp;

                self.stats.bwutil += self.cfg.burst_cycles() as u64;
                self.stats.bwutil_partial += self.cfg.burst_cycles() as u64;

                log::trace!("ch{}: PIM bk:{} row:{:03x}", self.id, j, self.banks[j].curr_row);

                self.banks[j].mrq = None;
            }

            self.ccd = self.cfg.t_ccd;
            self.wtr = self.cfg.t_wtr;
        }

        can_issue
    }

    /// Collective PIM row command: precharge every bank sitting on the wrong
    /// row, or, when none needs precharging, activate every idle bank to the
    /// PIM row. Precharge-first keeps a bank already on another row from
    /// starving the batch.
    fn issue_pim_row_command(&mut self) -> bool {
        let mut precharge_banks = Vec::new();
        let mut activate_banks = Vec::new();

        for j in 0..self.cfg.nbk {
            if let Some(rid) = self.banks[j].mrq {
                let row = self.arena.get(rid).row;
                let bank = &self.banks[j];
                if bank.state == BankState::Active && bank.curr_row != row {
                    precharge_banks.push(j);
                }
                else if bank.state == BankState::Idle {
                    activate_banks.push(j);
                }
            }
        }

        if !precharge_banks.is_empty() {
            let can_issue = precharge_banks.iter().all(|&j| {
                let bank = &self.banks[j];
                bank.ras == 0 && bank.wtp == 0 && bank.rtp == 0 && self.groups[bank.grp].rtpl == 0
            });

            if can_issue {
                for &j in precharge_banks.iter() {
                    log::trace!("ch{}: PRE bk:{} row:{:03x}", self.id, j, self.banks[j].curr_row);
                    self.banks[j].state = BankState::Idle;
                    self.banks[j].rp = self.cfg.t_rp;
                }

                self.prio = 0;
                self.stats.n_pre += 1;
                self.stats.n_pre_partial += 1;
            }

            can_issue
        }
        else if !activate_banks.is_empty() {
            let can_issue = activate_banks.iter().all(|&j| {
                let bank = &self.banks[j];
                self.rrd == 0 && bank.rp == 0 && bank.rc == 0
            });

            if can_issue {
                for &j in activate_banks.iter() {
                    let rid = self.banks[j].mrq.unwrap();
                    let row = self.arena.get(rid).row;
                    log::trace!("ch{}: ACT bk:{} row:{:03x} from:{:03x}", self.id, j, row, self.banks[j].curr_row);

                    let bank = &mut self.banks[j];
                    bank.curr_row = row;
                    bank.state = BankState::Active;
                    bank.rcd = self.cfg.t_rcd;
                    bank.rcdwr = self.cfg.t_rcdwr;
                    bank.ras = self.cfg.t_ras;
                    bank.rc = self.cfg.t_rc;
                }

                self.rrd = self.cfg.t_rrd;
                self.prio = 0;
                self.stats.n_act += 1;
                self.stats.n_act_partial += 1;
            }

            can_issue
        }
        else {
            false
        }
    }

    /// Banks with nothing latched and no timing in flight count against the
    /// activity statistic.
    fn idle_bank_tally(&mut self, mut still_busy: usize) -> usize {
        for j in 0..self.cfg.nbk {
            if self.banks[j].mrq.is_none() {
                if self.ccd == 0 && self.rrd == 0 && self.rtw == 0 && self.wtr == 0 && self.banks[j].timers_clear() {
                    still_busy -= 1;
                }
                self.banks[j].n_idle += 1;
            }
        }
        still_busy
    }

    /// Time-integrated bank-level parallelism, collected before issue.
    fn collect_blp_stats(&mut self) {
        let mut pending = 0usize;
        let mut pending_mem_only = 0usize;
        for bank in self.banks.iter() {
            if let Some(rid) = bank.mrq {
                pending += 1;
                if !self.arena.get(rid).is_pim {
                    pending_mem_only += 1;
                }
            }
        }
        self.stats.banks_1time += pending as u64;
        self.stats.banks_1time_mem_only += pending_mem_only as u64;
        if pending > 0 {
            self.stats.banks_access_total += 1;
        }
        if pending_mem_only > 0 {
            self.stats.banks_access_total_mem_only += 1;
        }

        let mut pending_rw = 0usize;
        let mut pending_rw_mem_only = 0usize;
        let mut read_blp = 0u64;
        let mut read_blp_mem_only = 0u64;
        let mut write_blp = 0u64;
        let mut write_blp_mem_only = 0u64;
        let mut grp_found: u64 = 0;
        let mut grp_found_mem_only: u64 = 0;

        for bank in self.banks.iter() {
            let Some(rid) = bank.mrq else {
                continue;
            };
            let req = self.arena.get(rid);
            if bank.state != BankState::Active || bank.curr_row != req.row {
                continue;
            }

            pending_rw += 1;
            grp_found |= 1 << bank.grp;
            if req.rw == AccessDir::Read {
                read_blp += 1;
            }
            else {
                write_blp += 1;
            }

            if !req.is_pim {
                pending_rw_mem_only += 1;
                grp_found_mem_only |= 1 << bank.grp;
                if req.rw == AccessDir::Read {
                    read_blp_mem_only += 1;
                }
                else {
                    write_blp_mem_only += 1;
                }
            }
        }

        self.stats.banks_time_rw += pending_rw as u64;
        self.stats.banks_time_rw_mem_only += pending_rw_mem_only as u64;
        self.stats.bkgrp_parallelism_rw += grp_found.count_ones() as u64;
        self.stats.bkgrp_parallelism_rw_mem_only += grp_found_mem_only.count_ones() as u64;
        if pending_rw > 0 {
            self.stats.write_to_read_ratio_blp_rw_average += write_blp as f64 / (write_blp + read_blp) as f64;
            self.stats.banks_access_rw_total += 1;
        }
        if pending_rw_mem_only > 0 {
            self.stats.write_to_read_ratio_blp_rw_average_mem_only +=
                write_blp_mem_only as f64 / (write_blp_mem_only + read_blp_mem_only) as f64;
            self.stats.banks_access_rw_total_mem_only += 1;
        }

        let mut pending_ready = 0usize;
        let mut pending_ready_mem_only = 0usize;
        for bank in self.banks.iter() {
            let Some(rid) = bank.mrq else {
                continue;
            };
            let req = self.arena.get(rid);
            let grp = bank.grp;
            let row_open = bank.state == BankState::Active && bank.curr_row == req.row;
            let ready = row_open
                && self.ccd == 0
                && self.groups[grp].ccdl == 0
                && !self.rwq.full()
                && match req.rw {
                    AccessDir::Read => bank.rcd == 0 && self.wtr == 0,
                    AccessDir::Write => bank.rcdwr == 0 && self.rtw == 0,
                };
            if ready {
                pending_ready += 1;
                if !req.is_pim {
                    pending_ready_mem_only += 1;
                }
            }
        }
        self.stats.banks_time_ready += pending_ready as u64;
        self.stats.banks_time_ready_mem_only += pending_ready_mem_only as u64;
        if pending_ready > 0 {
            self.stats.banks_access_ready_total += 1;
        }
        if pending_ready_mem_only > 0 {
            self.stats.banks_access_ready_total_mem_only += 1;
        }
    }

    /// Classify the cycle's column slot and, when a ready transfer was
    /// blocked, attribute the stall to the constraint that caused it.
    fn classify_bandwidth(&mut self, issued_col_cmd: bool) {
        let pending_found = self.banks.iter().filter(|b| b.mrq.is_some()).count();
        if pending_found > 0 {
            self.stats.banks_access_total_after += 1;
        }

        let pending_rw_found = self.banks.iter().any(|bank| {
            bank.mrq
                .map(|rid| {
                    let req = self.arena.get(rid);
                    bank.state == BankState::Active && bank.curr_row == req.row
                })
                .unwrap_or(false)
        });

        if issued_col_cmd || self.ccd > 0 {
            self.stats.util_bw += 1;
        }
        else if pending_rw_found {
            self.stats.wasted_bw_col += 1;

            for bank in self.banks.iter() {
                let Some(rid) = bank.mrq else {
                    continue;
                };
                let req = self.arena.get(rid);
                if bank.state != BankState::Active || bank.curr_row != req.row {
                    continue;
                }
                let grp = bank.grp;

                match req.rw {
                    AccessDir::Read => {
                        if bank.rcd > 0 {
                            self.stats.rcd_limit += 1;
                        }
                        if self.groups[grp].ccdl > 0 {
                            self.stats.ccdl_limit += 1;
                        }
                        if self.wtr > 0 {
                            self.stats.wtr_limit += 1;
                        }
                        if self.ccd > 0 {
                            self.stats.ccd_limit += 1;
                        }
                        if self.rwq.full() {
                            self.stats.rwq_limit += 1;
                        }
                        if self.groups[grp].ccdl > 0 && self.wtr == 0 {
                            self.stats.ccdl_limit_alone += 1;
                        }
                        if self.groups[grp].ccdl == 0 && self.wtr > 0 {
                            self.stats.wtr_limit_alone += 1;
                        }
                    }
                    AccessDir::Write => {
                        if bank.rcdwr > 0 {
                            self.stats.rcdwr_limit += 1;
                        }
                        if self.groups[grp].ccdl > 0 {
                            self.stats.ccdl_limit += 1;
                        }
                        if self.rtw > 0 {
                            self.stats.rtw_limit += 1;
                        }
                        if self.ccd > 0 {
                            self.stats.ccd_limit += 1;
                        }
                        if self.rwq.full() {
                            self.stats.rwq_limit += 1;
                        }
                        if self.groups[grp].ccdl > 0 && self.rtw == 0 {
                            self.stats.ccdl_limit_alone += 1;
                        }
                        if self.groups[grp].ccdl == 0 && self.rtw > 0 {
                            self.stats.rtw_limit_alone += 1;
                        }
                    }
                }
            }
        }
        else if pending_found > 0 {
            self.stats.wasted_bw_row += 1;
        }
        else {
            self.stats.idle_bw += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerType;

    fn test_config() -> MemoryConfig {
        MemoryConfig {
            nbk: 1,
            nbkgrp: 1,
            cl: 2,
            wl: 2,
            bl: 4,
            t_ccd: 1,
            t_ccdl: 1,
            t_rrd: 1,
            t_rcd: 4,
            t_rcdwr: 4,
            t_ras: 8,
            t_rp: 4,
            t_rc: 12,
            t_wtr: 1,
            t_rtw: 1,
            t_wtp: 4,
            t_rtpl: 1,
            atom_size: 4,
            data_command_freq_ratio: 2,
            bus_width: 2,
            ..Default::default()
        }
    }

    fn read_desc(bk: usize, row: u32, nbytes: u32, tag: u64) -> RequestDesc {
        RequestDesc {
            chan: 0,
            bk,
            row,
            col: 0,
            is_write: false,
            is_pim: false,
            nbytes,
            tag,
        }
    }

    fn pim_desc(row: u32, nbytes: u32) -> RequestDesc {
        RequestDesc {
            chan: 0,
            bk: 0,
            row,
            col: 0,
            is_write: true,
            is_pim: true,
            nbytes,
            tag: 0,
        }
    }

    #[test]
    fn test_single_read_idle_bank() {
        // nbk=1, tRCD=4, CL=2, BL=4, atom=4, nbytes=4: ACT on the first
        // cycle, RD on cycle 5, the reply lands on cycle 7.
        let mut ch = DramChannel::new(0, test_config()).unwrap();
        assert!(!ch.full(false, false));
        ch.push(read_desc(0, 0x10, 4, 42));

        ch.cycle();
        assert_eq!(ch.stats.n_act, 1, "ACT expected on cycle 1");

        for _ in 0..3 {
            ch.cycle();
        }
        assert_eq!(ch.stats.n_rd, 0);

        ch.cycle();
        assert_eq!(ch.stats.n_rd, 1, "RD expected on cycle 5");

        ch.cycle();
        assert!(ch.returnq_top().is_none());
        ch.cycle();
        let reply = ch.returnq_pop().expect("reply expected on cycle 7");
        assert_eq!(reply.tag, 42);
        assert_eq!(reply.dqbytes, 4);
        assert!(ch.arena.is_empty());
    }

    #[test]
    fn test_row_buffer_hit_streak() {
        // nbytes=16 over 4-byte atoms: RD on cycles 5..8, reply complete on
        // cycle 10.
        let mut ch = DramChannel::new(0, test_config()).unwrap();
        ch.push(read_desc(0, 0x10, 16, 7));

        for _ in 0..8 {
            ch.cycle();
        }
        assert_eq!(ch.stats.n_rd, 4);
        assert!(ch.banks[0].mrq.is_none(), "bank released after the fourth RD");

        ch.cycle();
        assert!(ch.returnq_top().is_none());
        ch.cycle();
        let reply = ch.returnq_pop().expect("reply expected on cycle 10");
        assert_eq!(reply.dqbytes, 16);
    }

    #[test]
    fn test_row_conflict_pre_then_act() {
        let mut ch = DramChannel::new(0, test_config()).unwrap();
        ch.push(read_desc(0, 0x10, 4, 1));
        ch.push(read_desc(0, 0x20, 4, 2));

        let mut replies = Vec::new();
        for _ in 0..60 {
            ch.cycle();
            if let Some(reply) = ch.returnq_pop() {
                replies.push(reply.tag);
            }
        }

        assert_eq!(replies, vec![1, 2], "row A serviced before row B");
        assert_eq!(ch.stats.n_act, 2);
        assert_eq!(ch.stats.n_pre, 1);
        assert!(ch.arena.is_empty());

        // ACT->RD->PRE ordering: the PRE cannot beat tRAS.
        assert!(ch.stats.n_cmd >= 8 + 4);
    }

    #[test]
    fn test_pim_collective_issue() {
        let cfg = MemoryConfig {
            nbk: 4,
            nbkgrp: 2,
            ..test_config()
        };
        let mut ch = DramChannel::new(0, cfg).unwrap();

        // Banks at rows {R, R, X, idle}.
        let pim_row = 0x40;
        ch.banks[0].state = BankState::Active;
        ch.banks[0].curr_row = pim_row;
        ch.banks[1].state = BankState::Active;
        ch.banks[1].curr_row = pim_row;
        ch.banks[2].state = BankState::Active;
        ch.banks[2].curr_row = 0x99;
        ch.banks[3].state = BankState::Idle;

        ch.push(pim_desc(pim_row, 4));

        let mut reply = None;
        for _ in 0..60 {
            ch.cycle();
            if let Some(r) = ch.returnq_pop() {
                reply = Some(r);
                break;
            }
        }

        let reply = reply.expect("PIM request completes");
        assert!(reply.is_pim);
        // One collective precharge (bank 2), one collective activate
        // (banks 2 and 3), then a single column command for all banks.
        assert_eq!(ch.stats.n_pre, 1);
        assert_eq!(ch.stats.n_act, 1);
        assert!(ch.banks.iter().all(|b| b.mrq.is_none()));
        assert_eq!(ch.stats.hits_pim_num, 2, "two banks already held the PIM row");
        assert!(ch.arena.is_empty());
    }

    #[test]
    fn test_fifo_pim_blocks_until_banks_drain() {
        let cfg = MemoryConfig {
            nbk: 2,
            nbkgrp: 1,
            scheduler_type: SchedulerType::Fifo,
            ..test_config()
        };
        let mut ch = DramChannel::new(0, cfg).unwrap();

        ch.push(read_desc(0, 0x10, 4, 1));
        ch.push(pim_desc(0x40, 4));
        ch.push(read_desc(1, 0x20, 4, 2));

        let mut replies = Vec::new();
        for _ in 0..120 {
            ch.cycle();
            if let Some(reply) = ch.returnq_pop() {
                replies.push(reply.tag);
            }
        }

        // Strict FIFO: the MEM read completes, then the PIM request (tag 0),
        // then the second read that queued behind it.
        assert_eq!(replies, vec![1, 0, 2]);
        assert!(ch.stats.nonpim_to_pim_switches >= 1);
        assert!(ch.stats.pim_to_nonpim_switches >= 1);
        assert!(ch.arena.is_empty());
    }

    #[test]
    fn test_idle_cycle_is_noop() {
        let mut ch = DramChannel::new(0, test_config()).unwrap();

        for _ in 0..10 {
            ch.cycle();
        }

        assert_eq!(ch.que_length(), 0);
        assert!(ch.arena.is_empty());
        assert!(ch.returnq_top().is_none());
        assert_eq!(ch.stats.idle_bw, 10);
        assert!(ch.banks.iter().all(|b| b.timers_clear()));
        assert_eq!(ch.rrd, 0);
        assert_eq!(ch.ccd, 0);
        assert_eq!(ch.rtw, 0);
        assert_eq!(ch.wtr, 0);
    }

    #[test]
    fn test_queue_bounds_respected() {
        let cfg = MemoryConfig {
            mem_queue_size: 2,
            pim_queue_size: 1,
            ..test_config()
        };
        let mut ch = DramChannel::new(0, cfg).unwrap();

        // A long transfer keeps the bank latched while more work queues up.
        assert!(!ch.full(false, false));
        ch.push(read_desc(0, 0x10, 16, 1));
        ch.push(read_desc(0, 0x20, 4, 2));
        ch.cycle();
        assert!(!ch.full(false, false));

        ch.push(read_desc(0, 0x30, 4, 3));
        ch.cycle();
        assert!(ch.full(false, false), "two MEM requests pending against a bound of 2");

        assert!(!ch.full(false, true));
        ch.push(pim_desc(0x40, 4));
        ch.cycle();
        assert!(ch.full(false, true));
    }

    #[test]
    fn test_data_conservation() {
        let cfg = MemoryConfig {
            nbk: 4,
            nbkgrp: 2,
            ..test_config()
        };
        let mut ch = DramChannel::new(0, cfg).unwrap();

        let mut pushed = 0u32;
        for (i, &(bk, row, nbytes)) in [(0usize, 0x10u32, 8u32), (1, 0x11, 16), (2, 0x12, 4), (3, 0x13, 12)]
            .iter()
            .enumerate()
        {
            ch.push(read_desc(bk, row, nbytes, i as u64));
            pushed += nbytes;
        }

        let mut delivered = 0u32;
        for _ in 0..200 {
            ch.cycle();
            if let Some(reply) = ch.returnq_pop() {
                assert_eq!(reply.dqbytes, reply.nbytes);
                delivered += reply.dqbytes;
            }
        }

        assert_eq!(delivered, pushed);
        assert!(ch.arena.is_empty());
    }

    #[test]
    fn test_writeback_released_not_returned() {
        let mut ch = DramChannel::new(0, test_config()).unwrap();
        ch.push(RequestDesc {
            chan: 0,
            bk: 0,
            row: 0x10,
            col: 0,
            is_write: true,
            is_pim: false,
            nbytes: 4,
            tag: 9,
        });

        for _ in 0..40 {
            ch.cycle();
        }

        assert_eq!(ch.stats.n_wr, 1);
        assert!(ch.returnq_top().is_none(), "writebacks do not produce replies");
        assert!(ch.arena.is_empty());
    }

    #[test]
    #[should_panic(expected = "wrong channel")]
    fn test_mismatched_channel_tag_panics() {
        let mut ch = DramChannel::new(3, test_config()).unwrap();
        ch.push(read_desc(0, 0x10, 4, 0));
    }

    #[test]
    fn test_dual_bus_issues_row_and_col_together() {
        let cfg = MemoryConfig {
            nbk: 2,
            nbkgrp: 2,
            dual_bus_interface: true,
            ..test_config()
        };
        let mut ch = DramChannel::new(0, cfg).unwrap();

        // A long hit streak on bank 1 overlaps a precharge on bank 0.
        ch.push(read_desc(0, 0x10, 4, 1));
        ch.push(read_desc(1, 0x30, 16, 2));
        ch.push(read_desc(0, 0x20, 4, 3));

        let mut replies = Vec::new();
        for _ in 0..60 {
            ch.cycle();
            if let Some(reply) = ch.returnq_pop() {
                replies.push(reply.tag);
            }
        }

        assert_eq!(replies.len(), 3);
        assert!(ch.stats.issued_two >= 1, "a row and a column command shared a cycle");
        assert!(ch.arena.is_empty());
    }

    #[test]
    fn test_act_to_act_spacing_honors_trc() {
        // Two requests to different rows on one bank: the second ACT cannot
        // issue until tRC has elapsed since the first.
        let mut ch = DramChannel::new(0, test_config()).unwrap();
        ch.push(read_desc(0, 0x10, 4, 1));
        ch.push(read_desc(0, 0x20, 4, 2));

        let mut act_cycles = Vec::new();
        let mut acts_seen = 0u64;
        for call in 1..=60u32 {
            ch.cycle();
            if ch.stats.n_act > acts_seen {
                acts_seen = ch.stats.n_act;
                act_cycles.push(call);
            }
        }

        assert_eq!(act_cycles.len(), 2);
        assert!(
            act_cycles[1] - act_cycles[0] >= ch.cfg.t_rc,
            "ACT-to-ACT spacing {} under tRC {}",
            act_cycles[1] - act_cycles[0],
            ch.cfg.t_rc
        );
    }
}
