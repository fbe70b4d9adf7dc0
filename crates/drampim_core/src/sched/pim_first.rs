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

    sched/pim_first.rs

    Degenerate policy, symmetric to mem_first: any pending PIM request takes
    the channel into PIM mode; MEM runs only when the PIM queue is drained.

*/

use crate::{
    channel::MemoryMode,
    config::MemoryConfig,
    sched::{core::SchedulerCore, SchedCtx, SchedulerPolicy},
};

pub struct PimFirst {
    core: SchedulerCore,
}

impl PimFirst {
    pub fn new(cfg: &MemoryConfig) -> PimFirst {
        PimFirst {
            core: SchedulerCore::new(cfg),
        }
    }
}

impl SchedulerPolicy for PimFirst {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SchedulerCore {
        &mut self.core
    }

    fn update_mode(&mut self, ctx: &mut SchedCtx) {
        let have_mem = self.core.num_pending + self.core.num_write_pending > 0;

        if self.core.num_pim_pending > 0 {
            if *ctx.mode != MemoryMode::Pim {
                *ctx.mode = MemoryMode::Pim;
                ctx.stats.nonpim_to_pim_switches += 1;
            }
        }
        else if *ctx.mode == MemoryMode::Pim && have_mem {
            *ctx.mode = MemoryMode::Read;
            ctx.stats.pim_to_nonpim_switches += 1;
        }

        self.core.update_rw_mode(ctx);
    }
}
