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
*/

//! DramPIM headless front-end library component.

pub mod run_config;
pub mod runner;

use std::path::Path;

use anyhow::Context;

use crate::run_config::RunConfig;

/// Load a run file, execute it, and print the per-channel reports.
pub fn run_file(path: &Path, cycles_override: Option<u64>) -> anyhow::Result<()> {
    let mut config = RunConfig::load(path).with_context(|| format!("loading run file {}", path.display()))?;

    if let Some(cycles) = cycles_override {
        config.cycles = cycles;
    }

    log::info!(
        "running {} channel(s) for {} cycles with scheduler {}",
        config.channels,
        config.cycles,
        config.memory.scheduler_type
    );

    let summary = runner::run(&config);

    for report in summary.reports.iter() {
        println!("{}", report);
        println!("========================================================================");
    }
    println!("completed {} replies over {} cycles", summary.replies, summary.cycles);

    Ok(())
}
