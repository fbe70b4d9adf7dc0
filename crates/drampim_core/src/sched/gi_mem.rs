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

    sched/gi_mem.rs

    Watermark policy on the MEM queues, the dual of gi: leave PIM mode when
    the MEM side backs up past its high watermark (or PIM drains), re-enter
    once MEM falls below the low watermark.

*/

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    sched::{core::SchedulerCore, SchedCtx, SchedulerPolicy},
};

pub struct GiMem {
    core: SchedulerCore,
}

impl GiMem {
    pub fn new(cfg: &MemoryConfig) -> GiMem {
        GiMem {
            core: SchedulerCore::new(cfg),
        }
    }
}

impl SchedulerPolicy for GiMem {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn update_mode(&mut self, ctx: &mut SchedCtx) {
        let have_mem = self.core.have_queued_reads() || self.core.have_queued_writes(ctx.cfg);
        let have_pim = !self.core.pim_queue.is_empty();

        if *ctx.mode == MemoryMode::Pim {
            if self.core.num_pending >= ctx.cfg.queue_high_watermark
                || self.core.num_write_pending >= ctx.cfg.write_high_watermark
                || (!have_pim && have_mem)
            {
                *ctx.mode = MemoryMode::Read;
                ctx.stats.pim_to_nonpim_switches += 1;
                log::debug!("gi_mem: switching to non-PIM mode");
            }
        }
        else if (self.core.num_pending < ctx.cfg.queue_low_watermark
            && self.core.num_write_pending < ctx.cfg.write_high_watermark)
            || (have_pim && !have_mem)
        {
            *ctx.mode = MemoryMode::Pim;
            ctx.stats.nonpim_to_pim_switches += 1;
            log::debug!("gi_mem: switching to PIM mode");
        }

        self.core.update_rw_mode(ctx);
    }
}
