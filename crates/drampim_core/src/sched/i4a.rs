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

    sched/i4a.rs

    Adaptive batch-cap policy. MEM arrival rate is sampled over fixed
    intervals; when it drifts past a tolerance the policy enters an
    exploration phase that doubles the PIM batch cap geometrically, then
    settles on the cap that maximized MEM completion rate. The tolerance
    anneals: repeated explorations that land on the same cap widen it.

*/

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    request::ReqId,
    sched::{
        batch::SlowdownMeter,
        core::{MissPick, SchedulerCore},
        SchedCtx,
        SchedulerPolicy,
    },
};

pub const I4A_INTERVAL_LENGTH: u64 = 10_000;
pub const I4A_MAX_MEM_REQ_OCCUPANCY: f32 = 0.8;
pub const I4A_MAX_PIM_BATCH_SIZE: u32 = 64;

pub struct I4a {
    core: SchedulerCore,
    meter: SlowdownMeter,

    finished_pim_batches: u32,
    max_pim_batches: u32,
    prev_max_pim_batches: u32,

    stable_state: bool,
    next_update_cycle: u64,
    prev_update_cycle: u64,
    exploratory_phase_start: u64,

    stable_arrival_rate: f32,
    curr_arrival_rate: f32,
    arrival_rate_tolerance: f32,

    curr_completion_rate: f32,
    completion_rates: Vec<f32>,
}

impl I4a {
    pub fn new(cfg: &MemoryConfig) -> I4a {
        I4a {
            core: SchedulerCore::new(cfg),
            meter: SlowdownMeter::new(cfg.nbk),
            finished_pim_batches: 0,
            max_pim_batches: 1,
            prev_max_pim_batches: 1,
            stable_state: true,
            next_update_cycle: I4A_INTERVAL_LENGTH,
            prev_update_cycle: 0,
            exploratory_phase_start: 0,
            stable_arrival_rate: 0.0,
            curr_arrival_rate: 0.0,
            arrival_rate_tolerance: 0.05,
            curr_completion_rate: 0.0,
            completion_rates: Vec::new(),
        }
    }

    /// Pick the cap whose exploration round produced the best MEM
    /// completion rate. Rounds double the cap, so round i maps to 2^i.
    fn best_explored_cap(&self) -> u32 {
        let mut best_rate = 0.0f32;
        let mut best_cap = self.max_pim_batches;
        for (i, &rate) in self.completion_rates.iter().enumerate() {
            if rate > best_rate {
                best_rate = rate;
                best_cap = 1 << i;
            }
        }
        best_cap
    }

    fn settle(&mut self) {
        self.stable_state = true;
        self.max_pim_batches = self.best_explored_cap();
        log::debug!("i4a: exploration finished; stable config = {} batches", self.max_pim_batches);

        if self.max_pim_batches == self.prev_max_pim_batches {
            self.arrival_rate_tolerance += 0.02;
            log::debug!("i4a: increasing tolerance to {}", self.arrival_rate_tolerance);
        }
    }

    fn end_exploratory_phase(&mut self, now: u64) {
        let span = now.saturating_sub(self.exploratory_phase_start).max(1);
        self.curr_completion_rate /= span as f32;
        self.exploratory_phase_start = now;

        if !self.stable_state {
            self.completion_rates.push(self.curr_completion_rate);
            self.max_pim_batches *= 2;

            if self.max_pim_batches > I4A_MAX_PIM_BATCH_SIZE {
                self.settle();
            }
        }

        self.curr_completion_rate = 0.0;
    }
}

impl SchedulerPolicy for I4a {
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
            if self.meter.batch_over(next_pim_row) {
                self.meter.pim_batch_dur = ctx.cycle - self.meter.pim_batch_start;
                let dur = self.meter.pim_batch_dur;
                self.meter.derive_mem_budgets(ctx.cfg, dur);
                self.finished_pim_batches += 1;
            }

            if self.finished_pim_batches >= self.max_pim_batches || !have_pim {
                if have_reads || have_writes {
                    self.meter.reset_mem_phase();

                    *ctx.mode = MemoryMode::Read;
                    ctx.stats.pim_to_nonpim_switches += 1;
                    log::debug!("i4a: switching to non-PIM mode after {} batches", self.finished_pim_batches);
                }
                else if self.finished_pim_batches == self.max_pim_batches {
                    self.end_exploratory_phase(ctx.cycle);
                }
            }
        }
        else if have_pim && (self.meter.budget_exceeded() || !(have_reads || have_writes)) {
            *ctx.mode = MemoryMode::Pim;
            ctx.stats.nonpim_to_pim_switches += 1;
            self.finished_pim_batches = 0;
            log::debug!("i4a: switching to PIM mode");

            self.end_exploratory_phase(ctx.cycle);

            if ctx.cycle > self.next_update_cycle {
                self.curr_arrival_rate /= (ctx.cycle - self.prev_update_cycle) as f32;

                let change = if self.stable_arrival_rate > 0.0 {
                    (self.curr_arrival_rate - self.stable_arrival_rate).abs() / self.stable_arrival_rate
                }
                else {
                    0.0
                };

                if change > self.arrival_rate_tolerance {
                    log::debug!(
                        "i4a: unstable phase; arrival rate change {:.4} over tolerance {:.4}",
                        change,
                        self.arrival_rate_tolerance
                    );
                    self.stable_state = false;

                    self.prev_max_pim_batches = self.max_pim_batches;
                    self.max_pim_batches = 1;
                    self.stable_arrival_rate = self.curr_arrival_rate;

                    self.completion_rates.clear();
                }
                else {
                    self.arrival_rate_tolerance -= 0.001_25;
                }

                self.prev_update_cycle = ctx.cycle;
                self.curr_arrival_rate = 0.0;
                self.next_update_cycle = ctx.cycle + I4A_INTERVAL_LENGTH;
            }
        }

        self.core.update_rw_mode(ctx);
    }

    fn add_req(&mut self, rid: ReqId, ctx: &mut SchedCtx) {
        self.core.add_req(rid, ctx);

        if !ctx.arena.get(rid).is_pim {
            self.curr_arrival_rate += 1.0;
        }

        // A MEM queue backing up past the occupancy bound ends exploration
        // early; the best cap seen so far wins.
        let mem_backed_up = self.core.num_pending as f32
            >= ctx.cfg.mem_queue_size as f32 * I4A_MAX_MEM_REQ_OCCUPANCY
            || self.core.num_write_pending as f32 >= ctx.cfg.write_queue_size as f32 * I4A_MAX_MEM_REQ_OCCUPANCY;

        if mem_backed_up && !self.stable_state {
            self.settle();
        }
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule(bank, curr_row, MissPick::OldestAny, ctx);
        self.meter.on_mem_schedule(bank, rid.is_some(), ctx.cycle);
        if rid.is_some() {
            self.curr_completion_rate += 1.0;
        }
        rid
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule_pim(ctx)?;
        self.meter.on_pim_schedule(ctx.arena.get(rid).row, ctx.cycle);
        Some(rid)
    }
}
