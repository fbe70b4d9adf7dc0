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

    config.rs

    Memory controller configuration: DDR timing table, queue bounds,
    scheduling policy selection and the policy tuning knobs.

*/

use core::fmt::Display;
use std::error::Error;

use serde_derive::Deserialize;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

use crate::request::{BankGroupIndexPolicy, BankIndexPolicy};

/// Scheduling policy selector. One canonical form per policy name.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, StrumDisplay, EnumString, EnumIter, Deserialize)]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SchedulerType {
    /// Head-of-line drain of the admission queue. No policy state.
    Fifo,
    /// First-ready FR-FCFS with oldest-first PIM arbitration and bypass cap.
    #[default]
    #[serde(rename = "frfcfs")]
    #[strum(serialize = "frfcfs")]
    FrFcfs,
    /// FR-FCFS with per-bank conflict latching, no cap.
    FrRrFcfs,
    MemFirst,
    PimFirst,
    /// Watermarks on the PIM queue.
    Gi,
    /// Watermarks on the MEM queue.
    GiMem,
    /// PIM transaction boundaries derive the MEM request budget.
    I1,
    /// Slowdown-bounded MEM phases.
    I2,
    /// I2 plus a minimum PIM batch count.
    I3,
    /// Batch-duration timer controls the switchback.
    I3Timer,
    /// Adaptive batch cap, arrival-rate phase detection.
    I4a,
    /// I4a variant that stretches its sampling interval under instability.
    I4b,
    HillClimbing,
    RrBatchCap,
    RrMem,
    /// BLISS-style blacklisting.
    Bliss,
    /// FR-FCFS with PIM requests threaded through the bank queues.
    PimFrfcfs,
    Paws,
    DynThresh,
    Queue2,
    Queue3,
    Queue4,
}

#[derive(Debug)]
pub enum ConfigError {
    BankCount,
    BankGroupCount(usize, usize),
    BankBitsNotPow2,
    ZeroTiming(&'static str),
    WatermarkOrder(&'static str),
}

impl Error for ConfigError {}
impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ConfigError::BankCount => write!(f, "Bank count must be nonzero."),
            ConfigError::BankGroupCount(nbk, nbkgrp) => {
                write!(f, "Bank count {} is not a multiple of bank group count {}.", nbk, nbkgrp)
            }
            ConfigError::BankBitsNotPow2 => {
                write!(f, "The selected bank/bank-group indexing requires a power-of-two bank count.")
            }
            ConfigError::ZeroTiming(name) => write!(f, "Timing or sizing parameter '{}' must be nonzero.", name),
            ConfigError::WatermarkOrder(name) => {
                write!(f, "Low watermark exceeds high watermark for '{}'.", name)
            }
        }
    }
}

/// Full controller configuration. Field names follow the conventional DDR
/// timing mnemonics; serde aliases accept the datasheet spellings (`tCCD`,
/// `tRCDWR`, ...). Queue bounds of 0 mean unlimited.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    pub nbk: usize,
    pub nbkgrp: usize,
    pub scheduler_type: SchedulerType,
    pub bank_index_policy: BankIndexPolicy,
    pub bankgrp_index_policy: BankGroupIndexPolicy,

    // DDR timing table, in command-clock cycles.
    #[serde(alias = "CL")]
    pub cl: u32,
    #[serde(alias = "WL")]
    pub wl: u32,
    #[serde(alias = "BL")]
    pub bl: u32,
    #[serde(alias = "tCCD")]
    pub t_ccd: u32,
    #[serde(alias = "tCCDL")]
    pub t_ccdl: u32,
    #[serde(alias = "tRRD")]
    pub t_rrd: u32,
    #[serde(alias = "tRCD")]
    pub t_rcd: u32,
    #[serde(alias = "tRCDWR")]
    pub t_rcdwr: u32,
    #[serde(alias = "tRAS")]
    pub t_ras: u32,
    #[serde(alias = "tRP")]
    pub t_rp: u32,
    #[serde(alias = "tRC")]
    pub t_rc: u32,
    #[serde(alias = "tWTR")]
    pub t_wtr: u32,
    #[serde(alias = "tRTW")]
    pub t_rtw: u32,
    #[serde(alias = "tWTP")]
    pub t_wtp: u32,
    #[serde(alias = "tRTPL")]
    pub t_rtpl: u32,

    /// Bytes transferred per column command.
    pub atom_size: u32,
    /// Data clock to command clock ratio.
    pub data_command_freq_ratio: u32,
    /// Data bus width in bytes.
    pub bus_width: u32,
    /// One row and one column command per cycle, vs. either-or.
    pub dual_bus_interface: bool,

    pub mem_queue_size: usize,
    pub write_queue_size: usize,
    pub pim_queue_size: usize,
    pub return_queue_size: usize,
    pub separate_write_queue_enabled: bool,

    // Mode-arbitration thresholds.
    pub write_high_watermark: usize,
    pub write_low_watermark: usize,
    pub queue_high_watermark: usize,
    pub queue_low_watermark: usize,
    pub pim_high_watermark: usize,
    pub pim_low_watermark: usize,

    // Starvation bounds.
    pub frfcfs_cap: u32,
    pub max_pim_slowdown: u32,
    pub min_pim_batches: u32,

    // Blacklist policy.
    pub bliss_clearing_interval: u64,
    pub bliss_blacklisting_threshold: u32,

    // Queue-balance policy tuning.
    pub queue_max_pim_batches: u32,
    pub queue_mem_time_ratio_high: f32,
    pub queue_mem_time_ratio_low: f32,
}

impl Default for MemoryConfig {
    fn default() -> MemoryConfig {
        MemoryConfig {
            nbk: 16,
            nbkgrp: 4,
            scheduler_type: SchedulerType::default(),
            bank_index_policy: BankIndexPolicy::default(),
            bankgrp_index_policy: BankGroupIndexPolicy::default(),

            cl: 20,
            wl: 4,
            bl: 4,
            t_ccd: 2,
            t_ccdl: 3,
            t_rrd: 6,
            t_rcd: 12,
            t_rcdwr: 5,
            t_ras: 28,
            t_rp: 12,
            t_rc: 40,
            t_wtr: 5,
            t_rtw: 18,
            t_wtp: 29,
            t_rtpl: 2,

            atom_size: 32,
            data_command_freq_ratio: 2,
            bus_width: 16,
            dual_bus_interface: false,

            mem_queue_size: 64,
            write_queue_size: 32,
            pim_queue_size: 64,
            return_queue_size: 32,
            separate_write_queue_enabled: false,

            write_high_watermark: 16,
            write_low_watermark: 8,
            queue_high_watermark: 32,
            queue_low_watermark: 16,
            pim_high_watermark: 32,
            pim_low_watermark: 16,

            frfcfs_cap: 0,
            max_pim_slowdown: 2,
            min_pim_batches: 1,

            bliss_clearing_interval: 10_000,
            bliss_blacklisting_threshold: 4,

            queue_max_pim_batches: 8,
            queue_mem_time_ratio_high: 4.0,
            queue_mem_time_ratio_low: 1.0,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nbk == 0 {
            return Err(ConfigError::BankCount);
        }
        if self.nbkgrp == 0 || self.nbk % self.nbkgrp != 0 {
            return Err(ConfigError::BankGroupCount(self.nbk, self.nbkgrp));
        }
        let needs_pow2 = !matches!(self.bank_index_policy, BankIndexPolicy::Linear | BankIndexPolicy::Custom)
            || self.bankgrp_index_policy == BankGroupIndexPolicy::LowerBits;
        if needs_pow2 && (!self.nbk.is_power_of_two() || !self.nbkgrp.is_power_of_two()) {
            return Err(ConfigError::BankBitsNotPow2);
        }
        if self.atom_size == 0 {
            return Err(ConfigError::ZeroTiming("atom_size"));
        }
        if self.data_command_freq_ratio == 0 {
            return Err(ConfigError::ZeroTiming("data_command_freq_ratio"));
        }
        if self.bus_width == 0 {
            return Err(ConfigError::ZeroTiming("bus_width"));
        }
        if self.bl == 0 {
            return Err(ConfigError::ZeroTiming("BL"));
        }
        if self.write_low_watermark > self.write_high_watermark {
            return Err(ConfigError::WatermarkOrder("write"));
        }
        if self.queue_low_watermark > self.queue_high_watermark {
            return Err(ConfigError::WatermarkOrder("queue"));
        }
        if self.pim_low_watermark > self.pim_high_watermark {
            return Err(ConfigError::WatermarkOrder("pim"));
        }
        Ok(())
    }

    /// Cycles of data-bus occupancy per column command.
    #[inline]
    pub fn burst_cycles(&self) -> u32 {
        self.bl / self.data_command_freq_ratio
    }

    /// Effective MEM bound: the separate write queue adds its own capacity.
    pub fn mem_capacity(&self) -> usize {
        self.mem_queue_size
            + if self.separate_write_queue_enabled {
                self.write_queue_size
            }
            else {
                0
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MemoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bank_group_multiple_enforced() {
        let cfg = MemoryConfig {
            nbk: 12,
            nbkgrp: 5,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::BankGroupCount(12, 5))));
    }

    #[test]
    fn test_scheduler_type_parses_config_strings() {
        assert_eq!(SchedulerType::from_str("frfcfs").unwrap(), SchedulerType::FrFcfs);
        assert_eq!(SchedulerType::from_str("i3_timer").unwrap(), SchedulerType::I3Timer);
        assert_eq!(SchedulerType::from_str("queue3").unwrap(), SchedulerType::Queue3);
        assert_eq!(SchedulerType::from_str("BLISS").unwrap(), SchedulerType::Bliss);
        assert!(SchedulerType::from_str("no_such_policy").is_err());
    }

    #[test]
    fn test_timing_aliases_deserialize() {
        let cfg: MemoryConfig = toml::from_str(
            r#"
            nbk = 8
            nbkgrp = 2
            scheduler_type = "gi"
            tCCD = 3
            tRCD = 14
            CL = 24
            "#,
        )
        .unwrap();
        assert_eq!(cfg.nbk, 8);
        assert_eq!(cfg.t_ccd, 3);
        assert_eq!(cfg.t_rcd, 14);
        assert_eq!(cfg.cl, 24);
        assert_eq!(cfg.scheduler_type, SchedulerType::Gi);
    }
}
