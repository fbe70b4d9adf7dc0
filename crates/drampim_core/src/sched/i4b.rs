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

    sched/i4b.rs

    I4a variant with instability scoring: every unstable interval adds to an
    instability score which decays while stable; past a threshold, the
    sampling interval doubles so a thrashing workload is observed over longer
    windows. The batch cap clamps at the maximum instead of re-picking.

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

pub const I4B_MAX_MEM_REQ_OCCUPANCY: f32 = 0.8;
pub const I4B_MAX_PIM_BATCH_SIZE: u32 = 64;
pub const I4B_ARRIVAL_RATE_TOLERANCE: f32 = 0.05;
pub const I4B_MAX_INSTABILITY: f32 = 4.0;

pub struct I4b {
    core: SchedulerCore,
    meter: SlowdownMeter,

    finished_pim_batches: u32,
    max_pim_batches: u32,

    stable_state: bool,
    interval_length: u64,
    next_update_cycle: u64,
    prev_update_cycle: u64,
    exploratory_phase_start: u64,

    stable_arrival_rate: f32,
    curr_arrival_rate: f32,
    instability: f32,

    curr_completion_rate: f32,
    completion_rates: Vec<f32>,
}

impl I4b {
    pub fn new(cfg: &MemoryConfig) -> I4b {
        I4b {
            core: SchedulerCore::new(cfg),
            meter: SlowdownMeter::new(cfg.nbk),
            finished_pim_batches: 0,
            max_pim_batches: 1,
            stable_state: true,
            interval_length: 10_000,
            next_update_cycle: 10_000,
            prev_update_cycle: 0,
            exploratory_phase_start: 0,
            stable_arrival_rate: 0.0,
            curr_arrival_rate: 0.0,
            instability: 0.0,
            curr_completion_rate: 0.0,
            completion_rates: Vec::new(),
        }
    }

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

    fn end_exploratory_phase(&mut self, now: u64) {
        let span = now.saturating_sub(self.exploratory_phase_start).max(1);
        self.curr_completion_rate /= span as f32;
        self.exploratory_phase_start = now;

        if !self.stable_state {
            self.completion_rates.push(self.curr_completion_rate);
            self.max_pim_batches *= 2;

            if self.max_pim_batches > I4B_MAX_PIM_BATCH_SIZE {
                self.max_pim_batches = I4B_MAX_PIM_BATCH_SIZE;
                self.stable_state = true;
                log::debug!("i4b: reached max batch size; stable config = {} batches", self.max_pim_batches);
            }
        }

        self.curr_completion_rate = 0.0;
    }
}

impl SchedulerPolicy for I4b {
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
                    log::debug!("i4b: switching to non-PIM mode after {} batches", self.finished_pim_batches);
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
            log::debug!("i4b: switching to PIM mode");

            self.end_exploratory_phase(ctx.cycle);

            if ctx.cycle > self.next_update_cycle {
                self.curr_arrival_rate /= (ctx.cycle - self.prev_update_cycle) as f32;

                let change = if self.stable_arrival_rate > 0.0 {
                    (self.curr_arrival_rate - self.stable_arrival_rate).abs() / self.stable_arrival_rate
                }
                else {
                    0.0
                };

                if change > I4B_ARRIVAL_RATE_TOLERANCE {
                    log::debug!("i4b: unstable phase; arrival rate change {:.4}", change);
                    self.stable_state = false;

                    self.max_pim_batches = 1;
                    self.stable_arrival_rate = self.curr_arrival_rate;

                    self.completion_rates.clear();

                    self.instability += 2.0;
                    if self.instability > I4B_MAX_INSTABILITY {
                        self.instability = 0.0;
                        self.interval_length *= 2;
                        log::debug!("i4b: instability over threshold; new interval = {}", self.interval_length);
                    }
                }
                else {
                    self.instability -= 0.125;
                }

                self.prev_update_cycle = ctx.cycle;
                self.curr_arrival_rate = 0.0;
                self.next_update_cycle = ctx.cycle + self.interval_length;
            }
        }

        self.core.update_rw_mode(ctx);
    }

    fn add_req(&mut self, rid: ReqId, ctx: &mut SchedCtx) {
        self.core.add_req(rid, ctx);

        if !ctx.arena.get(rid).is_pim {
            self.curr_arrival_rate += 1.0;
        }

        let mem_backed_up = self.core.num_pending as f32
            >= ctx.cfg.mem_queue_size as f32 * I4B_MAX_MEM_REQ_OCCUPANCY
            || self.core.num_write_pending as f32 >= ctx.cfg.write_queue_size as f32 * I4B_MAX_MEM_REQ_OCCUPANCY;

        if mem_backed_up && !self.stable_state {
            self.stable_state = true;
            self.max_pim_batches = self.best_explored_cap();
            log::debug!("i4b: exploration cut short; stable config = {} batches", self.max_pim_batches);
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
