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

    sched/gi.rs

    Watermark policy on the PIM queue: enter PIM mode when the PIM queue
    crosses its high watermark (or MEM is empty), leave once it drains below
    the low watermark and MEM work exists.

*/

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    sched::{core::SchedulerCore, SchedCtx, SchedulerPolicy},
};

pub struct Gi {
    core: SchedulerCore,
}

impl Gi {
    pub fn new(cfg: &MemoryConfig) -> Gi {
        Gi {
            core: SchedulerCore::new(cfg),
        }
    }
}

impl SchedulerPolicy for Gi {
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
            if self.core.num_pim_pending < ctx.cfg.pim_low_watermark && (have_reads || have_writes) {
                // Drop to READ; the write watermark check below decides
                // whether the write phase takes over.
                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("gi: switching to non-PIM mode");
            }
        }
        else if self.core.num_pim_pending >= ctx.cfg.pim_high_watermark || (!have_reads && !have_writes && have_pim)
        {
            *ctx.mode = MemoryMode::Pim;
            ctx.stats.nonpim_to_pim_switches += 1;
            log::debug!("gi: switching to PIM mode");
        }

        self.core.update_rw_mode(ctx);
    }
}
