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

    benches/channel_bench.rs

    Benchmark the channel cycle loop under a mixed MEM/PIM load.

*/

use criterion::{criterion_group, criterion_main, Criterion};

use drampim_core::{DramChannel, MemoryConfig, RequestDesc};

fn mixed_workload(c: &mut Criterion) {
    c.bench_function("channel_10k_cycles_mixed", |b| {
        b.iter(|| {
            let cfg = MemoryConfig {
                nbk: 16,
                nbkgrp: 4,
                ..Default::default()
            };
            let mut ch = DramChannel::new(0, cfg).unwrap();

            let mut tag = 0u64;
            for cycle in 0..10_000u64 {
                if cycle % 7 == 0 && !ch.full(false, false) {
                    ch.push(RequestDesc {
                        chan: 0,
                        bk: (cycle as usize) % 16,
                        row: ((cycle / 16) % 64) as u32,
                        col: 0,
                        is_write: cycle % 3 == 0,
                        is_pim: false,
                        nbytes: 32,
                        tag,
                    });
                    tag += 1;
                }
                if cycle % 61 == 0 && !ch.full(false, true) {
                    ch.push(RequestDesc {
                        chan: 0,
                        bk: 0,
                        row: 1024 + ((cycle / 61) % 8) as u32,
                        col: 0,
                        is_write: true,
                        is_pim: true,
                        nbytes: 32,
                        tag,
                    });
                    tag += 1;
                }

                ch.cycle();
                while ch.returnq_pop().is_some() {}
            }

            ch.stats().n_cmd
        })
    });
}

criterion_group!(benches, mixed_workload);
criterion_main!(benches);
