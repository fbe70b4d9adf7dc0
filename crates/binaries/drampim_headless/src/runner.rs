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

    runner.rs

    Synthetic workload generator and the main run loop. Stands in for the
    interconnect: generates arrivals, respects the controllers' queue-full
    backpressure, and drains their return queues.

*/

use rand::{rngs::StdRng, Rng, SeedableRng};

use drampim_core::{DramChannel, RequestDesc};

use crate::run_config::RunConfig;

/// Per-channel workload source. MEM rows and PIM rows are drawn from
/// disjoint ranges so the PIM row-exclusivity invariant holds by
/// construction.
pub struct WorkloadGen {
    rng: StdRng,
    chan: usize,
    nbk: usize,
    last_row: Vec<u32>,
    pim_backlog: u32,
    pim_row: u32,
    next_tag: u64,
}

impl WorkloadGen {
    pub fn new(chan: usize, nbk: usize, seed: u64) -> WorkloadGen {
        WorkloadGen {
            rng: StdRng::seed_from_u64(seed ^ (chan as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            chan,
            nbk,
            last_row: vec![0; nbk],
            pim_backlog: 0,
            pim_row: 0,
            next_tag: 0,
        }
    }

    /// Next MEM arrival for this cycle, if the dice say so.
    pub fn gen_mem(&mut self, cfg: &RunConfig) -> Option<RequestDesc> {
        if !self.rng.gen_bool(cfg.workload.mem_rate) {
            return None;
        }

        let bk = self.rng.gen_range(0..self.nbk);
        let row = if self.rng.gen_bool(cfg.workload.row_locality) {
            self.last_row[bk]
        }
        else {
            self.rng.gen_range(0..cfg.workload.rows)
        };
        self.last_row[bk] = row;

        let tag = self.next_tag;
        self.next_tag += 1;

        Some(RequestDesc {
            chan: self.chan,
            bk,
            row,
            col: self.rng.gen_range(0..64) * cfg.memory.atom_size,
            is_write: self.rng.gen_bool(cfg.workload.write_fraction),
            is_pim: false,
            nbytes: cfg.workload.nbytes,
            tag,
        })
    }

    /// Next PIM arrival. PIM requests come in row batches; a fresh batch
    /// starts when the backlog drains and the rate fires.
    pub fn gen_pim(&mut self, cfg: &RunConfig) -> Option<RequestDesc> {
        if self.pim_backlog == 0 {
            if !self.rng.gen_bool(cfg.workload.pim_rate) {
                return None;
            }
            self.pim_backlog = cfg.workload.pim_batch;
            // Rows above the MEM row space stay disjoint from it.
            self.pim_row = cfg.workload.rows + self.rng.gen_range(0..cfg.workload.pim_rows);
        }

        self.pim_backlog -= 1;
        let tag = self.next_tag;
        self.next_tag += 1;

        Some(RequestDesc {
            chan: self.chan,
            bk: 0,
            row: self.pim_row,
            col: 0,
            is_write: true,
            is_pim: true,
            nbytes: cfg.memory.atom_size,
            tag,
        })
    }
}

pub struct RunSummary {
    pub cycles: u64,
    pub replies: u64,
    pub reports: Vec<String>,
}

/// Drive `config.channels` controllers for `config.cycles` cycles.
pub fn run(config: &RunConfig) -> RunSummary {
    let mut channels: Vec<DramChannel> = (0..config.channels)
        .map(|id| DramChannel::new(id, config.memory.clone()).expect("validated configuration"))
        .collect();
    let mut sources: Vec<WorkloadGen> = (0..config.channels)
        .map(|id| WorkloadGen::new(id, config.memory.nbk, config.seed))
        .collect();

    let mut replies = 0u64;
    let mut stalled_mem: Vec<Option<RequestDesc>> = vec![None; config.channels];
    let mut stalled_pim: Vec<Option<RequestDesc>> = vec![None; config.channels];

    for _ in 0..config.cycles {
        for (i, channel) in channels.iter_mut().enumerate() {
            // Retry arrivals that hit backpressure before rolling new ones.
            let mem = stalled_mem[i].take().or_else(|| sources[i].gen_mem(config));
            if let Some(desc) = mem {
                if channel.full(desc.is_write, false) {
                    stalled_mem[i] = Some(desc);
                }
                else {
                    channel.push(desc);
                }
            }

            let pim = stalled_pim[i].take().or_else(|| sources[i].gen_pim(config));
            if let Some(desc) = pim {
                if channel.full(true, true) {
                    stalled_pim[i] = Some(desc);
                }
                else {
                    channel.push(desc);
                }
            }

            channel.cycle();

            while let Some(reply) = channel.returnq_pop() {
                log::trace!("reply from ch{}: tag {}", i, reply.tag);
                replies += 1;
            }
        }
    }

    RunSummary {
        cycles: config.cycles,
        replies,
        reports: channels.iter().map(|c| c.report()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_config::WorkloadConfig;
    use drampim_core::{MemoryConfig, SchedulerType};

    #[test]
    fn test_short_run_completes_requests() {
        let config = RunConfig {
            cycles: 20_000,
            channels: 1,
            seed: 7,
            memory: MemoryConfig {
                nbk: 8,
                nbkgrp: 2,
                scheduler_type: SchedulerType::FrFcfs,
                frfcfs_cap: 16,
                ..Default::default()
            },
            workload: WorkloadConfig {
                mem_rate: 0.2,
                pim_rate: 0.01,
                pim_batch: 4,
                ..Default::default()
            },
        };
        config.validate().unwrap();

        let summary = run(&config);
        assert!(summary.replies > 0, "a 20k-cycle run should complete work");
        assert!(summary.reports[0].contains("Row_Buffer_Locality"));
    }

    #[test]
    fn test_deterministic_given_seed() {
        let config = RunConfig {
            cycles: 5_000,
            ..Default::default()
        };

        let a = run(&config);
        let b = run(&config);
        assert_eq!(a.replies, b.replies);
        assert_eq!(a.reports, b.reports);
    }
}
