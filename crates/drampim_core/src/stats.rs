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

    stats.rs

    Per-channel statistics accumulators: command counts, bandwidth
    classification with bottleneck attribution, row-buffer locality, bank
    level parallelism, mode-switch accounting, arrival-rate phases and the
    end-of-run report. Statistics are per controller; totals across
    controllers are summed at report time by the frontend.

*/

use std::fmt::Write;

use crate::bank::Bank;

pub const NUM_UTIL_BINS: usize = 10;
pub const NUM_PHASES: usize = 10;
pub const BASE_PHASE_LENGTH: u64 = 10_000;
pub const PHASE_INSTABILITY_THRESHOLD: f32 = 0.05;

/// Why a mode switch fired. Only the policies that track reasons use all
/// variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwitchReason {
    OldestFirst,
    OutOfRequests,
    CapExceeded,
    RowBufferConflict,
}

pub const NUM_SWITCH_REASONS: usize = 4;

impl SwitchReason {
    pub fn label(&self) -> &'static str {
        match self {
            SwitchReason::OldestFirst => "OldestFirst",
            SwitchReason::OutOfRequests => "OutOfRequests",
            SwitchReason::CapExceeded => "CapExceeded",
            SwitchReason::RowBufferConflict => "RowBufferConflict",
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Streaming accumulator for a latency-like series: mean, max and standard
/// deviation without storing the samples.
#[derive(Clone, Debug, Default)]
pub struct Series {
    pub n: u64,
    pub sum: f64,
    pub sum_sq: f64,
    pub max: u64,
    pub zeros: u64,
}

impl Series {
    pub fn push(&mut self, v: u64) {
        self.n += 1;
        self.sum += v as f64;
        self.sum_sq += (v as f64) * (v as f64);
        if v > self.max {
            self.max = v;
        }
        if v == 0 {
            self.zeros += 1;
        }
    }

    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            0.0
        }
        else {
            self.sum / self.n as f64
        }
    }

    pub fn stdev(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_sq / self.n as f64 - mean * mean).max(0.0).sqrt()
    }

    /// Mean over the nonzero samples only.
    pub fn mean_nonzero(&self) -> f64 {
        let nz = self.n - self.zeros;
        if nz == 0 {
            0.0
        }
        else {
            self.sum / nz as f64
        }
    }
}

/// Arrival-rate phase bookkeeping over geometrically increasing windows
/// (10 000 · 2^i cycles). A phase is unstable when its request count moves
/// more than 5% from the reference count of the last stable phase.
#[derive(Clone, Debug)]
pub struct PhaseTracker {
    pub phase_length: Vec<u64>,
    pub num_total_phases: Vec<u64>,
    pub num_unstable_phases: Vec<u64>,
    phase_requests: Vec<u64>,
    stable_phase_requests: Vec<u64>,
    pub arr_rate_changes: Vec<Vec<f32>>,
}

impl Default for PhaseTracker {
    fn default() -> PhaseTracker {
        PhaseTracker {
            phase_length: (0..NUM_PHASES).map(|i| BASE_PHASE_LENGTH << i).collect(),
            num_total_phases: vec![0; NUM_PHASES],
            num_unstable_phases: vec![0; NUM_PHASES],
            phase_requests: vec![0; NUM_PHASES],
            stable_phase_requests: vec![0; NUM_PHASES],
            arr_rate_changes: vec![Vec::new(); NUM_PHASES],
        }
    }
}

impl PhaseTracker {
    /// Called for every MEM request admission.
    pub fn on_mem_arrival(&mut self) {
        for count in self.phase_requests.iter_mut() {
            *count += 1;
        }
    }

    /// Called at the end of every channel cycle, after the cycle counter has
    /// advanced.
    pub fn advance(&mut self, cycle: u64) {
        for i in 0..self.phase_length.len() {
            if cycle % self.phase_length[i] != 0 {
                continue;
            }
            self.num_total_phases[i] += 1;

            if self.num_total_phases[i] == 1 {
                self.stable_phase_requests[i] = self.phase_requests[i];
            }
            else if self.stable_phase_requests[i] == 0 {
                if self.phase_requests[i] != 0 {
                    self.num_unstable_phases[i] += 1;
                    self.stable_phase_requests[i] = self.phase_requests[i];
                }
            }
            else {
                let delta = self.phase_requests[i].abs_diff(self.stable_phase_requests[i]);
                let change = delta as f32 / self.stable_phase_requests[i] as f32;
                self.arr_rate_changes[i].push(change);

                if change > PHASE_INSTABILITY_THRESHOLD {
                    self.num_unstable_phases[i] += 1;
                    self.stable_phase_requests[i] = self.phase_requests[i];
                }
            }

            self.phase_requests[i] = 0;
        }
    }

    fn change_summary(&self, i: usize) -> (f32, f32, f32) {
        let series = &self.arr_rate_changes[i];
        if series.is_empty() {
            return (-1.0, -1.0, -1.0);
        }
        let mut sorted = series.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = sorted.len();
        let median = if n % 2 == 0 {
            (sorted[n / 2] + sorted[n / 2 - 1]) / 2.0
        }
        else {
            sorted[(n - 1) / 2]
        };
        (sorted[0], median, sorted[n - 1])
    }
}

/// Snapshot of the sampling-interval counters, reset on read. Used by
/// frontends that chart utilization over time.
#[derive(Copy, Clone, Debug, Default)]
pub struct PartialSample {
    pub n_cmd: u64,
    pub n_nop: u64,
    pub n_act: u64,
    pub n_pre: u64,
    pub n_req: u64,
    pub ave_mrqs: u64,
    pub ave_pim_mrqs: u64,
    /// Percent of cycles with a column burst on the bus.
    pub util: u64,
    /// Percent of busy cycles with a column burst on the bus.
    pub eff: u64,
}

#[derive(Clone, Debug, Default)]
pub struct ChannelStats {
    // Command counts.
    pub n_cmd: u64,
    pub n_activity: u64,
    pub n_nop: u64,
    pub n_act: u64,
    pub n_pre: u64,
    pub n_rd: u64,
    pub n_wr: u64,
    pub n_pim: u64,
    pub n_req: u64,

    // Bandwidth classification per cycle.
    pub bwutil: u64,
    pub util_bw: u64,
    pub wasted_bw_col: u64,
    pub wasted_bw_row: u64,
    pub idle_bw: u64,

    // What blocked a ready column slot.
    pub rcd_limit: u64,
    pub rcdwr_limit: u64,
    pub ccd_limit: u64,
    pub ccdl_limit: u64,
    pub ccdl_limit_alone: u64,
    pub wtr_limit: u64,
    pub wtr_limit_alone: u64,
    pub rtw_limit: u64,
    pub rtw_limit_alone: u64,
    pub rwq_limit: u64,

    // Row-buffer locality.
    pub access_num: u64,
    pub read_num: u64,
    pub write_num: u64,
    pub pim_num: u64,
    pub hits_num: u64,
    pub hits_read_num: u64,
    pub hits_write_num: u64,
    pub hits_pim_num: u64,

    // Bank-level parallelism (time-integrated).
    pub banks_1time: u64,
    pub banks_access_total: u64,
    pub banks_access_total_after: u64,
    pub banks_time_rw: u64,
    pub banks_access_rw_total: u64,
    pub banks_time_ready: u64,
    pub banks_access_ready_total: u64,
    pub write_to_read_ratio_blp_rw_average: f64,
    pub bkgrp_parallelism_rw: u64,

    // MEM-only mirrors of the BLP statistics.
    pub banks_1time_mem_only: u64,
    pub banks_access_total_mem_only: u64,
    pub banks_time_rw_mem_only: u64,
    pub banks_access_rw_total_mem_only: u64,
    pub banks_time_ready_mem_only: u64,
    pub banks_access_ready_total_mem_only: u64,
    pub write_to_read_ratio_blp_rw_average_mem_only: f64,
    pub bkgrp_parallelism_rw_mem_only: u64,

    // Dual-bus issue accounting.
    pub issued_total: u64,
    pub issued_total_row: u64,
    pub issued_total_col: u64,
    pub issued_two: u64,

    // Queue occupancy aggregates.
    pub max_mrqs: u64,
    pub ave_mrqs: u64,
    pub max_pim_mrqs: u64,
    pub ave_pim_mrqs: u64,

    // Mode-switch accounting.
    pub pim_to_nonpim_switches: u64,
    pub nonpim_to_pim_switches: u64,
    pub nonpim_to_pim_switch_latency: u64,
    pub nonpim_to_pim_switch_conflicts: u64,
    pub first_non_pim_insert: u64,
    pub first_pim_insert: u64,
    pub last_non_pim_finish: u64,
    pub last_pim_finish: u64,
    pub pim_queueing_delay: u64,
    pub non_pim_queueing_delay: u64,

    // Arrival spacing between consecutive admissions, per class.
    pub mem_arrival_interval: Series,
    pub pim_arrival_interval: Series,

    // Queueing latency (admission to bank dispatch), per class.
    pub mrq_latency: Series,
    pub mem_mrq_latency: Series,
    pub pim_mrq_latency: Series,

    // Service latency (dispatch to last column command), per class.
    pub service_latency: Series,
    pub mem_service_latency: Series,
    pub pim_service_latency: Series,

    // Per-bank scheduler accounting.
    pub row_access: Vec<u64>,
    pub concurrent_row_access: Vec<u64>,
    pub max_conc_access_to_same_row: Vec<u64>,
    pub max_service_time_to_same_row: Vec<u64>,
    pub num_activates: Vec<u64>,

    // Utilization histograms over sampling intervals.
    pub util_bins: [u64; NUM_UTIL_BINS],
    pub eff_bins: [u64; NUM_UTIL_BINS],

    // Sampling-interval counters, reset by `sample_partial`.
    pub n_cmd_partial: u64,
    pub n_activity_partial: u64,
    pub n_nop_partial: u64,
    pub n_act_partial: u64,
    pub n_pre_partial: u64,
    pub n_req_partial: u64,
    pub bwutil_partial: u64,
    pub ave_mrqs_partial: u64,
    pub ave_pim_mrqs_partial: u64,

    pub phases: PhaseTracker,
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    }
    else {
        num as f64 / den as f64
    }
}

impl ChannelStats {
    pub fn new(nbk: usize) -> ChannelStats {
        ChannelStats {
            row_access: vec![0; nbk],
            concurrent_row_access: vec![0; nbk],
            max_conc_access_to_same_row: vec![0; nbk],
            max_service_time_to_same_row: vec![0; nbk],
            num_activates: vec![0; nbk],
            ..Default::default()
        }
    }

    pub fn bw_util(&self) -> f64 {
        ratio(self.bwutil, self.n_cmd)
    }

    pub fn row_locality(&self) -> f64 {
        ratio(self.hits_num, self.access_num)
    }

    pub fn blp(&self) -> f64 {
        ratio(self.banks_1time, self.banks_access_total)
    }

    /// Drain the sampling-interval counters, binning utilization and
    /// efficiency into the 10-bucket histograms.
    pub fn sample_partial(&mut self) -> PartialSample {
        let util = if self.n_cmd_partial > 0 {
            100 * self.bwutil_partial / self.n_cmd_partial
        }
        else {
            0
        };
        let eff = if self.n_activity_partial > 0 {
            100 * self.bwutil_partial / self.n_activity_partial
        }
        else {
            0
        };
        self.util_bins[(util as usize / 10).min(NUM_UTIL_BINS - 1)] += 1;
        self.eff_bins[(eff as usize / 10).min(NUM_UTIL_BINS - 1)] += 1;

        let sample = PartialSample {
            n_cmd: self.n_cmd_partial,
            n_nop: self.n_nop_partial,
            n_act: self.n_act_partial,
            n_pre: self.n_pre_partial,
            n_req: self.n_req_partial,
            ave_mrqs: if self.n_cmd_partial > 0 {
                self.ave_mrqs_partial / self.n_cmd_partial
            }
            else {
                0
            },
            ave_pim_mrqs: if self.n_cmd_partial > 0 {
                self.ave_pim_mrqs_partial / self.n_cmd_partial
            }
            else {
                0
            },
            util,
            eff,
        };

        self.n_cmd_partial = 0;
        self.n_activity_partial = 0;
        self.n_nop_partial = 0;
        self.n_act_partial = 0;
        self.n_pre_partial = 0;
        self.n_req_partial = 0;
        self.bwutil_partial = 0;
        self.ave_mrqs_partial = 0;
        self.ave_pim_mrqs_partial = 0;

        sample
    }

    /// Format the end-of-run report. `policy_extra` carries the extended
    /// statistics of the active scheduling policy, if any.
    pub fn report(&self, id: usize, banks: &[Bank], policy_extra: Option<&str>) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "DRAM[{}]: n_cmd={} n_nop={} n_act={} n_pre={} n_req={} n_rd={} n_wr={} n_pim={} bw_util={:.4}",
            id, self.n_cmd, self.n_nop, self.n_act, self.n_pre, self.n_req, self.n_rd, self.n_wr, self.n_pim,
            self.bw_util()
        );
        let _ = writeln!(
            out,
            "n_activity={} dram_eff={:.4}",
            self.n_activity,
            ratio(self.bwutil, self.n_activity)
        );
        for (i, bank) in banks.iter().enumerate() {
            let _ = write!(out, "bk{}: {}a {}i ", i, bank.n_access, bank.n_idle);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "\nRow_Buffer_Locality = {:.6}", self.row_locality());
        let _ = writeln!(out, "Row_Buffer_Locality_read = {:.6}", ratio(self.hits_read_num, self.read_num));
        let _ = writeln!(out, "Row_Buffer_Locality_write = {:.6}", ratio(self.hits_write_num, self.write_num));
        let _ = writeln!(out, "Row_Buffer_Locality_pim = {:.6}", ratio(self.hits_pim_num, self.pim_num));

        let _ = writeln!(out, "\nBank_Level_Parallelism = {:.6}", self.blp());
        let _ = writeln!(
            out,
            "Bank_Level_Parallelism_Col = {:.6}",
            ratio(self.banks_time_rw, self.banks_access_rw_total)
        );
        let _ = writeln!(
            out,
            "Bank_Level_Parallelism_Ready = {:.6}",
            ratio(self.banks_time_ready, self.banks_access_ready_total)
        );
        let _ = writeln!(
            out,
            "write_to_read_ratio_blp_rw_average = {:.6}",
            if self.banks_access_rw_total == 0 {
                0.0
            }
            else {
                self.write_to_read_ratio_blp_rw_average / self.banks_access_rw_total as f64
            }
        );
        let _ = writeln!(
            out,
            "GrpLevelPara = {:.6}",
            ratio(self.bkgrp_parallelism_rw, self.banks_access_rw_total)
        );

        let _ = writeln!(
            out,
            "\nBank_Level_Parallelism_MEM_only = {:.6}",
            ratio(self.banks_1time_mem_only, self.banks_access_total_mem_only)
        );
        let _ = writeln!(
            out,
            "Bank_Level_Parallelism_Col_MEM_only = {:.6}",
            ratio(self.banks_time_rw_mem_only, self.banks_access_rw_total_mem_only)
        );
        let _ = writeln!(
            out,
            "Bank_Level_Parallelism_Ready_MEM_only = {:.6}",
            ratio(self.banks_time_ready_mem_only, self.banks_access_ready_total_mem_only)
        );
        let _ = writeln!(
            out,
            "GrpLevelPara_MEM_only = {:.6}",
            ratio(self.bkgrp_parallelism_rw_mem_only, self.banks_access_rw_total_mem_only)
        );

        let _ = writeln!(out, "\nAvgNonPimReqArrivalInterval = {:.6}", self.mem_arrival_interval.mean());
        let _ = writeln!(out, "MaxNonPimReqArrivalInterval = {}", self.mem_arrival_interval.max);
        let _ = writeln!(out, "StDevNonPimReqArrivalInterval = {:.6}", self.mem_arrival_interval.stdev());
        let _ = writeln!(out, "AvgPimReqArrivalInterval = {:.6}", self.pim_arrival_interval.mean());
        let _ = writeln!(out, "MaxPimReqArrivalInterval = {}", self.pim_arrival_interval.max);
        let _ = writeln!(out, "StDevPimReqArrivalInterval = {:.6}", self.pim_arrival_interval.stdev());

        let _ = writeln!(out, "\nBW Util details:");
        let _ = writeln!(out, "bwutil = {:.6}", self.bw_util());
        let _ = writeln!(out, "total_CMD = {}", self.n_cmd);
        let _ = writeln!(out, "util_bw = {}", self.util_bw);
        let _ = writeln!(out, "Wasted_Col = {}", self.wasted_bw_col);
        let _ = writeln!(out, "Wasted_Row = {}", self.wasted_bw_row);
        let _ = writeln!(out, "Idle = {}", self.idle_bw);

        let _ = writeln!(out, "\nBW Util Bottlenecks:");
        let _ = writeln!(out, "RCD_limit = {}", self.rcd_limit);
        let _ = writeln!(out, "RCDWR_limit = {}", self.rcdwr_limit);
        let _ = writeln!(out, "WTR_limit = {}", self.wtr_limit);
        let _ = writeln!(out, "RTW_limit = {}", self.rtw_limit);
        let _ = writeln!(out, "CCD_limit = {}", self.ccd_limit);
        let _ = writeln!(out, "CCDL_limit = {}", self.ccdl_limit);
        let _ = writeln!(out, "rwq_limit = {}", self.rwq_limit);
        let _ = writeln!(out, "CCDL_limit_alone = {}", self.ccdl_limit_alone);
        let _ = writeln!(out, "WTR_limit_alone = {}", self.wtr_limit_alone);
        let _ = writeln!(out, "RTW_limit_alone = {}", self.rtw_limit_alone);

        let _ = writeln!(out, "\nCommands details:");
        let _ = writeln!(out, "n_nop = {}", self.n_nop);
        let _ = writeln!(out, "Read = {}", self.n_rd);
        let _ = writeln!(out, "Write = {}", self.n_wr);
        let _ = writeln!(out, "PIM = {}", self.n_pim);
        let _ = writeln!(out, "n_act = {}", self.n_act);
        let _ = writeln!(out, "n_pre = {}", self.n_pre);
        let _ = writeln!(out, "n_req = {}", self.n_req);

        let _ = writeln!(out, "\nPIM statistics:");
        let _ = writeln!(out, "pim2nonpimswitches = {}", self.pim_to_nonpim_switches);
        let _ = writeln!(out, "nonpim2pimswitches = {}", self.nonpim_to_pim_switches);
        let _ = writeln!(out, "nonpim2pimswitchlatency = {}", self.nonpim_to_pim_switch_latency);
        let _ = writeln!(out, "nonpim2pimswitchconflicts = {}", self.nonpim_to_pim_switch_conflicts);
        let _ = writeln!(out, "first_non_pim_insert = {}", self.first_non_pim_insert);
        let _ = writeln!(out, "first_pim_insert = {}", self.first_pim_insert);
        let _ = writeln!(out, "last_non_pim_finish = {}", self.last_non_pim_finish);
        let _ = writeln!(out, "last_pim_finish = {}", self.last_pim_finish);
        let _ = writeln!(out, "avg_pim_queueing_delay = {:.6}", ratio(self.pim_queueing_delay, self.n_pim));
        let _ = writeln!(
            out,
            "avg_non_pim_queueing_delay = {:.6}",
            ratio(self.non_pim_queueing_delay, self.n_rd + self.n_wr)
        );
        let _ = writeln!(out, "avg_mrq_latency = {:.6}", self.mrq_latency.mean());
        let _ = writeln!(out, "avg_pim_mrq_latency = {:.6}", self.pim_mrq_latency.mean());
        let _ = writeln!(out, "avg_non_pim_mrq_latency = {:.6}", self.mem_mrq_latency.mean());
        let _ = writeln!(out, "avg_service_latency = {:.6}", self.service_latency.mean());
        let _ = writeln!(out, "avg_pim_service_latency = {:.6}", self.pim_service_latency.mean());
        let _ = writeln!(out, "avg_non_pim_service_latency = {:.6}", self.mem_service_latency.mean());

        let _ = writeln!(out, "\nDual Bus Interface Util:");
        let _ = writeln!(out, "issued_total_row = {}", self.issued_total_row);
        let _ = writeln!(out, "issued_total_col = {}", self.issued_total_col);
        let _ = writeln!(out, "Row_Bus_Util = {:.6}", ratio(self.issued_total_row, self.n_cmd));
        let _ = writeln!(out, "Col_Bus_Util = {:.6}", ratio(self.issued_total_col, self.n_cmd));
        let _ = writeln!(out, "Either_Row_Col_Bus_Util = {:.6}", ratio(self.issued_total, self.n_cmd));
        let _ = writeln!(out, "Issued_on_Two_Bus_Simul_Util = {:.6}", ratio(self.issued_two, self.n_cmd));
        let _ = writeln!(out, "issued_two_Eff = {:.6}", ratio(self.issued_two, self.issued_total));
        let _ = writeln!(out, "queue_avg = {:.6}", ratio(self.ave_mrqs, self.n_cmd));
        let _ = writeln!(out, "queue_avg_pim = {:.6}", ratio(self.ave_pim_mrqs, self.n_cmd));
        let _ = writeln!(out, "queue_max = {}", self.max_mrqs);
        let _ = writeln!(out, "queue_max_pim = {}", self.max_pim_mrqs);

        let _ = write!(out, "\ndram_util_bins:");
        for bin in self.util_bins.iter() {
            let _ = write!(out, " {}", bin);
        }
        let _ = write!(out, "\ndram_eff_bins:");
        for bin in self.eff_bins.iter() {
            let _ = write!(out, " {}", bin);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "\nPer-bank accounting:");
        for (i, _) in banks.iter().enumerate() {
            let _ = writeln!(
                out,
                "bk{}: row_access={} max_conc_same_row={} max_service_same_row={} activates={}",
                i,
                self.row_access[i],
                self.max_conc_access_to_same_row[i],
                self.max_service_time_to_same_row[i],
                self.num_activates[i]
            );
        }

        let _ = writeln!(out, "\nPhase statistics:");
        for i in 0..self.phases.phase_length.len() {
            let (min, median, max) = self.phases.change_summary(i);
            let _ = writeln!(
                out,
                "{}K (total/unstable) = {} / {}; arr_rate_change (min/median/max) = {:.6} / {:.6} / {:.6}",
                (self.phases.phase_length[i] / 1000),
                self.phases.num_total_phases[i],
                self.phases.num_unstable_phases[i],
                min,
                median,
                max
            );
        }

        if let Some(extra) = policy_extra {
            let _ = writeln!(out, "\n{}", extra);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_moments() {
        let mut s = Series::default();
        for v in [2u64, 4, 6] {
            s.push(v);
        }
        assert_eq!(s.n, 3);
        assert_eq!(s.max, 6);
        assert!((s.mean() - 4.0).abs() < 1e-9);
        assert!((s.stdev() - (8.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_series_mean_nonzero() {
        let mut s = Series::default();
        s.push(0);
        s.push(10);
        assert!((s.mean() - 5.0).abs() < 1e-9);
        assert!((s.mean_nonzero() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_boundary_and_instability() {
        let mut p = PhaseTracker::default();
        // First phase establishes the reference.
        for _ in 0..100 {
            p.on_mem_arrival();
        }
        p.advance(BASE_PHASE_LENGTH);
        assert_eq!(p.num_total_phases[0], 1);
        assert_eq!(p.num_unstable_phases[0], 0);

        // Second phase within 5% stays stable.
        for _ in 0..103 {
            p.on_mem_arrival();
        }
        p.advance(BASE_PHASE_LENGTH * 2);
        assert_eq!(p.num_unstable_phases[0], 0);

        // Third phase jumps by more than 5%.
        for _ in 0..150 {
            p.on_mem_arrival();
        }
        p.advance(BASE_PHASE_LENGTH * 3);
        assert_eq!(p.num_unstable_phases[0], 1);
    }

    #[test]
    fn test_partial_sample_resets() {
        let mut stats = ChannelStats::new(4);
        stats.n_cmd_partial = 100;
        stats.bwutil_partial = 40;
        stats.n_activity_partial = 50;
        let sample = stats.sample_partial();
        assert_eq!(sample.util, 40);
        assert_eq!(sample.eff, 80);
        assert_eq!(stats.n_cmd_partial, 0);
        assert_eq!(stats.util_bins[4], 1);
        assert_eq!(stats.eff_bins[8], 1);
    }
}
