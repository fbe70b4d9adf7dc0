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

    sched/mod.rs

    The pluggable scheduling policy interface and the policy registry.
    One file per policy, the FIFO path excepted (it has no policy state and
    lives in the channel).

*/

pub mod batch;
pub mod core;

pub mod bliss;
pub mod dyn_thresh;
pub mod fr_rr_fcfs;
pub mod frfcfs;
pub mod gi;
pub mod gi_mem;
pub mod hill_climbing;
pub mod i1;
pub mod i2;
pub mod i3;
pub mod i3_timer;
pub mod i4a;
pub mod i4b;
pub mod mem_first;
pub mod paws;
pub mod pim_first;
pub mod pim_frfcfs;
pub mod queue2;
pub mod queue3;
pub mod queue4;
pub mod rr_batch_cap;
pub mod rr_mem;

use enum_dispatch::enum_dispatch;

use crate::{
    bank::Bank,
    channel::MemoryMode,
    config::{MemoryConfig, SchedulerType},
    request::{ReqArena, ReqId},
    stats::ChannelStats,
};

use self::core::{MissPick, SchedulerCore};

use bliss::Bliss;
use dyn_thresh::DynThresh;
use fr_rr_fcfs::FrRrFcfs;
use frfcfs::FrFcfs;
use gi::Gi;
use gi_mem::GiMem;
use hill_climbing::HillClimbing;
use i1::I1;
use i2::I2;
use i3::I3;
use i3_timer::I3Timer;
use i4a::I4a;
use i4b::I4b;
use mem_first::MemFirst;
use paws::Paws;
use pim_first::PimFirst;
use pim_frfcfs::PimFrfcfs;
use queue2::Queue2;
use queue3::Queue3;
use queue4::Queue4;
use rr_batch_cap::RrBatchCap;
use rr_mem::RrMem;

/// The borrowed slice of channel state a policy sees during one call. The
/// policy owns its queues; everything else (mode, bank state, the request
/// arena and the statistics sink) belongs to the channel and is lent per
/// invocation.
pub struct SchedCtx<'a> {
    pub cfg: &'a MemoryConfig,
    pub mode: &'a mut MemoryMode,
    pub banks: &'a [Bank],
    pub arena: &'a ReqArena,
    pub stats: &'a mut ChannelStats,
    pub cycle: u64,
}

/// Scheduling policy capability set. Default implementations provide plain
/// FR-FCFS request handling; most policies only override `update_mode`.
#[enum_dispatch]
pub trait SchedulerPolicy {
    fn core(&self) -> &SchedulerCore;
    fn core_mut(&mut self) -> &mut SchedulerCore;

    /// Admit a freshly arrived request into the policy's queues.
    fn add_req(&mut self, rid: ReqId, ctx: &mut SchedCtx) {
        self.core_mut().add_req(rid, ctx);
    }

    /// Called once per cycle before issue; may flip the channel mode.
    fn update_mode(&mut self, ctx: &mut SchedCtx);

    /// Pick the next MEM request for `bank`, preferring a hit on `curr_row`.
    fn schedule(&mut self, bank: usize, curr_row: u32, ctx: &mut SchedCtx) -> Option<ReqId> {
        self.core_mut().schedule(bank, curr_row, MissPick::OldestAny, ctx)
    }

    /// Pick the next PIM request, shared across all banks.
    fn schedule_pim(&mut self, ctx: &mut SchedCtx) -> Option<ReqId> {
        self.core_mut().schedule_pim(ctx)
    }

    /// Policy-specific statistics appended to the end-of-run report.
    fn extended_stats(&self, _cfg: &MemoryConfig) -> Option<String> {
        None
    }
}

#[enum_dispatch(SchedulerPolicy)]
pub enum SchedulerKind {
    FrFcfs,
    FrRrFcfs,
    MemFirst,
    PimFirst,
    Gi,
    GiMem,
    I1,
    I2,
    I3,
    I3Timer,
    I4a,
    I4b,
    HillClimbing,
    RrBatchCap,
    RrMem,
    Bliss,
    PimFrfcfs,
    Paws,
    DynThresh,
    Queue2,
    Queue3,
    Queue4,
}

impl SchedulerKind {
    /// Instantiate the configured policy. `None` selects the FIFO path,
    /// which keeps no policy state.
    pub fn create(cfg: &MemoryConfig) -> Option<SchedulerKind> {
        match cfg.scheduler_type {
            SchedulerType::Fifo => None,
            SchedulerType::FrFcfs => Some(FrFcfs::new(cfg).into()),
            SchedulerType::FrRrFcfs => Some(FrRrFcfs::new(cfg).into()),
            SchedulerType::MemFirst => Some(MemFirst::new(cfg).into()),
            SchedulerType::PimFirst => Some(PimFirst::new(cfg).into()),
            SchedulerType::Gi => Some(Gi::new(cfg).into()),
            SchedulerType::GiMem => Some(GiMem::new(cfg).into()),
            SchedulerType::I1 => Some(I1::new(cfg).into()),
            SchedulerType::I2 => Some(I2::new(cfg).into()),
            SchedulerType::I3 => Some(I3::new(cfg).into()),
            SchedulerType::I3Timer => Some(I3Timer::new(cfg).into()),
            SchedulerType::I4a => Some(I4a::new(cfg).into()),
            SchedulerType::I4b => Some(I4b::new(cfg).into()),
            SchedulerType::HillClimbing => Some(HillClimbing::new(cfg).into()),
            SchedulerType::RrBatchCap => Some(RrBatchCap::new(cfg).into()),
            SchedulerType::RrMem => Some(RrMem::new(cfg).into()),
            SchedulerType::Bliss => Some(Bliss::new(cfg).into()),
            SchedulerType::PimFrfcfs => Some(PimFrfcfs::new(cfg).into()),
            SchedulerType::Paws => Some(Paws::new(cfg).into()),
            SchedulerType::DynThresh => Some(DynThresh::new(cfg).into()),
            SchedulerType::Queue2 => Some(Queue2::new(cfg).into()),
            SchedulerType::Queue3 => Some(Queue3::new(cfg).into()),
            SchedulerType::Queue4 => Some(Queue4::new(cfg).into()),
        }
    }
}
