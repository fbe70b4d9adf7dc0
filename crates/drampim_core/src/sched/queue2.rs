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

    sched/queue2.rs

    Adaptive queue-balance policy. Over fixed phases it compares the
    normalized average occupancy of the MEM and PIM queues and steers two
    knobs toward balance: the MEM-phase time ratio and the minimum PIM batch
    count. Larger imbalances take larger steps.

*/

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

pub const QUEUE2_PHASE_LENGTH: u64 = 1000;

pub struct Queue2 {
    core: SchedulerCore,

    mem_queue_size: usize,
    pim_queue_size: usize,
    prev_ave_mrqs: u64,
    prev_ave_pim_mrqs: u64,

    last_pim_row: Option<u32>,
    pim_batch_start: u64,
    pim_phase_dur: u64,
    mem_phase_start: u64,
    next_update_cycle: u64,

    finished_pim_batches: u32,
    min_pim_batches: u32,
    mem_time_ratio: f32,

    min_pim_batches_hi: u32,
    mem_time_ratio_hi: f32,
    mem_time_ratio_lo: f32,
}

impl Queue2 {
    pub fn new(cfg: &MemoryConfig) -> Queue2 {
        Queue2 {
            core: SchedulerCore::new(cfg),
            mem_queue_size: cfg.mem_capacity().max(1),
            pim_queue_size: cfg.pim_queue_size.max(1),
            prev_ave_mrqs: 0,
            prev_ave_pim_mrqs: 0,
            last_pim_row: None,
            pim_batch_start: 0,
            pim_phase_dur: 0,
            mem_phase_start: 0,
            next_update_cycle: QUEUE2_PHASE_LENGTH,
            finished_pim_batches: 0,
            min_pim_batches: 1,
            mem_time_ratio: 1.0,
            min_pim_batches_hi: cfg.queue_max_pim_batches,
            mem_time_ratio_hi: cfg.queue_mem_time_ratio_high,
            mem_time_ratio_lo: cfg.queue_mem_time_ratio_low,
        }
    }

    /// Phase-boundary update of the two balance knobs from the average
    /// queue occupancies accumulated by the channel.
    fn update_switch_conditions(&mut self, ctx: &mut SchedCtx) {
        if ctx.cycle < self.next_update_cycle {
            return;
        }

        let phase_length = ctx.cycle - self.next_update_cycle + QUEUE2_PHASE_LENGTH;

        let pim_pending = ctx.stats.ave_pim_mrqs;
        let mem_pending = ctx.stats.ave_mrqs.saturating_sub(pim_pending);

        let queue_avg = (mem_pending.saturating_sub(self.prev_ave_mrqs)) as f32
            / phase_length as f32
            / self.mem_queue_size as f32;
        let queue_avg_pim = (pim_pending.saturating_sub(self.prev_ave_pim_mrqs)) as f32
            / phase_length as f32
            / self.pim_queue_size as f32;
        let objective = (queue_avg - queue_avg_pim).abs();

        if objective > 0.05 {
            if queue_avg > queue_avg_pim {
                // MEM is backing up; lengthen the MEM share.
                if objective <= 0.1 {
                    self.mem_time_ratio = (self.mem_time_ratio + 0.2).min(self.mem_time_ratio_hi);

                    if self.mem_time_ratio == self.mem_time_ratio_hi && self.min_pim_batches > 1 {
                        self.min_pim_batches -= 1;
                        self.mem_time_ratio = (self.mem_time_ratio_hi - self.mem_time_ratio_lo) / 2.0;
                    }
                }
                else if objective <= 0.5 {
                    self.min_pim_batches = self.min_pim_batches.saturating_sub(1).max(1);
                    self.mem_time_ratio = (self.mem_time_ratio + 0.5).min(self.mem_time_ratio_hi);
                }
                else {
                    self.min_pim_batches = 1;
                    self.mem_time_ratio = (self.mem_time_ratio + 1.0).min(self.mem_time_ratio_hi);
                }
            }
            else {
                // PIM is backing up; lengthen the PIM share.
                if objective <= 0.1 {
                    self.mem_time_ratio = (self.mem_time_ratio - 0.2).max(self.mem_time_ratio_lo);

                    if self.mem_time_ratio == self.mem_time_ratio_lo && self.min_pim_batches < self.min_pim_batches_hi
                    {
                        self.min_pim_batches += 1;
                        self.mem_time_ratio = (self.mem_time_ratio_hi - self.mem_time_ratio_lo) / 2.0;
                    }
                }
                else if objective <= 0.5 {
                    self.min_pim_batches = (self.min_pim_batches + 1).min(self.min_pim_batches_hi);
                    self.mem_time_ratio = (self.mem_time_ratio - 0.5).max(self.mem_time_ratio_lo);
                }
                else {
                    self.min_pim_batches = (self.min_pim_batches * 2).min(self.min_pim_batches_hi);
                    self.mem_time_ratio = self.mem_time_ratio_lo;
                }
            }

            log::debug!(
                "queue2: mem_ratio={:.2}, pim_batches={}",
                self.mem_time_ratio,
                self.min_pim_batches
            );
        }

        self.prev_ave_mrqs = mem_pending;
        self.prev_ave_pim_mrqs = pim_pending;
        self.next_update_cycle = ctx.cycle + QUEUE2_PHASE_LENGTH;
    }
}

impl SchedulerPolicy for Queue2 {
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
            let batch_over = self.pim_batch_start > 0
                && match next_pim_row {
                    None => true,
                    Some(row) => self.last_pim_row != Some(row),
                };

            if batch_over {
                self.update_switch_conditions(ctx);

                let batch_exec_time = ctx.cycle - self.pim_batch_start;
                self.pim_batch_start = 0;

                self.finished_pim_batches += 1;
                if self.finished_pim_batches <= self.min_pim_batches {
                    self.pim_phase_dur += batch_exec_time;
                }
            }

            if (self.finished_pim_batches >= self.min_pim_batches || !have_pim) && (have_reads || have_writes) {
                self.finished_pim_batches = 0;

                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("queue2: switching to non-PIM mode");
            }
        }
        else {
            self.update_switch_conditions(ctx);

            if have_pim {
                let switch_cycle =
                    self.mem_phase_start + (self.pim_phase_dur as f32 * self.mem_time_ratio) as u64;

                if (self.mem_phase_start > 0 && ctx.cycle > switch_cycle) || !(have_reads || have_writes) {
                    self.pim_phase_dur = 0;
                    self.mem_phase_start = 0;

                    *ctx.mode = MemoryMode::Pim;
                    ctx.stats.nonpim_to_pim_switches += 1;
                    log::debug!("queue2: switching to PIM mode");
                }
            }
        }

        self.core.update_rw_mode(ctx);
    }

    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule(bank, curr_row, MissPick::OldestAny, ctx);

        if rid.is_some() && self.mem_phase_start == 0 {
            self.mem_phase_start = ctx.cycle;
        }

        rid
    }

    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        let rid = self.core.schedule_pim(ctx)?;

        if self.pim_batch_start == 0 {
            self.pim_batch_start = ctx.cycle;
        }
        self.last_pim_row = Some(ctx.arena.get(rid).row);

        Some(rid)
    }
}
