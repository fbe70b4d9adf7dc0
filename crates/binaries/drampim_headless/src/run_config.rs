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

    run_config.rs

    Run file format: controller configuration plus a synthetic workload
    description, parsed from TOML.

*/

use std::path::Path;

use serde_derive::Deserialize;
use thiserror::Error;

use drampim_core::MemoryConfig;

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("couldn't read run file: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't parse run file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid memory configuration: {0}")]
    Memory(#[from] drampim_core::ConfigError),
    #[error("invalid workload: {0}")]
    Workload(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkloadConfig {
    /// MEM arrivals per channel cycle (0.0 ..= 1.0).
    pub mem_rate: f64,
    /// Fraction of MEM arrivals that are writebacks.
    pub write_fraction: f64,
    /// PIM batch arrivals per channel cycle.
    pub pim_rate: f64,
    /// Consecutive PIM requests per batch, all to one row.
    pub pim_batch: u32,
    /// MEM row space per bank.
    pub rows: u32,
    /// PIM row space, drawn from a disjoint range above `rows`.
    pub pim_rows: u32,
    /// Probability that a MEM arrival reuses the previous row of its bank.
    pub row_locality: f64,
    /// Bytes per MEM request.
    pub nbytes: u32,
}

impl Default for WorkloadConfig {
    fn default() -> WorkloadConfig {
        WorkloadConfig {
            mem_rate: 0.25,
            write_fraction: 0.3,
            pim_rate: 0.005,
            pim_batch: 8,
            rows: 4096,
            pim_rows: 64,
            row_locality: 0.6,
            nbytes: 32,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub cycles: u64,
    pub channels: usize,
    pub seed: u64,
    pub memory: MemoryConfig,
    pub workload: WorkloadConfig,
}

impl Default for RunConfig {
    fn default() -> RunConfig {
        RunConfig {
            cycles: 1_000_000,
            channels: 1,
            seed: 0xD12A,
            memory: MemoryConfig::default(),
            workload: WorkloadConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<RunConfig, RunConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        self.memory.validate()?;

        if self.channels == 0 {
            return Err(RunConfigError::Workload("channel count must be nonzero".into()));
        }
        for (name, rate) in [
            ("mem_rate", self.workload.mem_rate),
            ("write_fraction", self.workload.write_fraction),
            ("pim_rate", self.workload.pim_rate),
            ("row_locality", self.workload.row_locality),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(RunConfigError::Workload(format!("{} must be within [0, 1]", name)));
            }
        }
        if self.workload.rows == 0 || self.workload.pim_rows == 0 {
            return Err(RunConfigError::Workload("row spaces must be nonzero".into()));
        }
        if self.workload.nbytes == 0 || self.workload.nbytes % self.memory.atom_size != 0 {
            return Err(RunConfigError::Workload(format!(
                "nbytes must be a nonzero multiple of atom_size ({})",
                self.memory.atom_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_file_parses() {
        let config: RunConfig = toml::from_str(
            r#"
            cycles = 50000
            channels = 2
            seed = 99

            [memory]
            nbk = 8
            nbkgrp = 2
            scheduler_type = "i3"
            frfcfs_cap = 16

            [workload]
            mem_rate = 0.5
            pim_rate = 0.01
            pim_batch = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.cycles, 50_000);
        assert_eq!(config.channels, 2);
        assert_eq!(config.memory.nbk, 8);
        assert_eq!(config.workload.pim_batch, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_rate_rejected() {
        let config = RunConfig {
            workload: WorkloadConfig {
                mem_rate: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
