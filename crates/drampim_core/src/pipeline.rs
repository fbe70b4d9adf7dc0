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

    pipeline.rs

    The data-bus latency pipeline (rwq) and the bounded outbound queue
    (returnq). An entry pushed into the pipeline at cycle t becomes poppable
    at cycle t + latency; the latency tracks CAS latency for reads and write
    latency after a bus turnaround.

*/

use std::collections::VecDeque;

#[derive(Debug)]
pub struct DelayPipeline<T> {
    entries: VecDeque<(T, u64)>,
    latency: u32,
    capacity: usize,
}

impl<T> DelayPipeline<T> {
    /// `capacity` of 0 means unbounded.
    pub fn new(latency: u32, capacity: usize) -> DelayPipeline<T> {
        DelayPipeline {
            entries: VecDeque::new(),
            latency,
            capacity,
        }
    }

    /// Burst-turnaround adjustment; applies to entries pushed afterwards.
    pub fn set_latency(&mut self, latency: u32) {
        self.latency = latency;
    }

    pub fn push(&mut self, item: T, now: u64) {
        debug_assert!(!self.full(), "push into full pipeline");
        self.entries.push_back((item, now + self.latency as u64));
    }

    /// Pop the head entry if its bus latency has elapsed. At most one entry
    /// drains per cycle; ordering is strictly the push order.
    pub fn pop(&mut self, now: u64) -> Option<T> {
        match self.entries.front() {
            Some(&(_, ready)) if ready <= now => self.entries.pop_front().map(|(item, _)| item),
            _ => None,
        }
    }

    pub fn full(&self) -> bool {
        self.capacity != 0 && self.entries.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outbound reply queue. Filled on the channel clock, drained on the
/// interconnect clock, so it is a plain bounded FIFO with no latency of its
/// own.
#[derive(Debug)]
pub struct ReturnQueue<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> ReturnQueue<T> {
    pub fn new(capacity: usize) -> ReturnQueue<T> {
        ReturnQueue {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        debug_assert!(!self.full(), "push into full return queue");
        self.entries.push_back(item);
    }

    pub fn top(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    pub fn full(&self) -> bool {
        self.capacity != 0 && self.entries.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_latency() {
        let mut p: DelayPipeline<u32> = DelayPipeline::new(2, 3);
        p.push(7, 5);
        assert_eq!(p.pop(5), None);
        assert_eq!(p.pop(6), None);
        assert_eq!(p.pop(7), Some(7));
        assert_eq!(p.pop(8), None);
    }

    #[test]
    fn test_pipeline_preserves_order() {
        let mut p: DelayPipeline<u32> = DelayPipeline::new(2, 0);
        p.push(1, 0);
        p.push(2, 0);
        p.push(3, 1);
        assert_eq!(p.pop(2), Some(1));
        assert_eq!(p.pop(2), Some(2));
        // One entry not yet ready stays put even though the head slot is open.
        assert_eq!(p.pop(2), None);
        assert_eq!(p.pop(3), Some(3));
    }

    #[test]
    fn test_pipeline_capacity() {
        let mut p: DelayPipeline<u32> = DelayPipeline::new(1, 2);
        p.push(1, 0);
        assert!(!p.full());
        p.push(2, 0);
        assert!(p.full());
        p.pop(1);
        assert!(!p.full());
    }

    #[test]
    fn test_turnaround_latency_applies_to_new_entries() {
        let mut p: DelayPipeline<u32> = DelayPipeline::new(2, 0);
        p.push(1, 0);
        p.set_latency(4);
        p.push(2, 0);
        assert_eq!(p.pop(2), Some(1));
        assert_eq!(p.pop(3), None);
        assert_eq!(p.pop(4), Some(2));
    }

    #[test]
    fn test_return_queue_bound() {
        let mut q: ReturnQueue<u32> = ReturnQueue::new(2);
        q.push(1);
        q.push(2);
        assert!(q.full());
        assert_eq!(q.top(), Some(&1));
        assert_eq!(q.pop(), Some(1));
        assert!(!q.full());
    }
}
