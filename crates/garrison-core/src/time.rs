// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame-stepping primitives.
//!
//! The engine is single-threaded and advances in discrete frames. [`FrameClock`]
//! turns raw wall-clock deltas into the scaled delta that gameplay sees, and
//! [`Incremental`] is the contract for work that must be spread across several
//! frames instead of blocking one.

/// Raw deltas above this value (in seconds) are clamped, so a debugger pause or
/// a long load does not produce one enormous simulation step.
pub const MAX_DELTA_TIME: f32 = 10.0;

/// Tracks per-frame timing.
#[derive(Debug, Clone)]
pub struct FrameClock {
    time_scale: f32,
    delta_time: f32,
    raw_delta_time: f32,
    total_time: f32,
    frame: u64,
}

impl FrameClock {
    /// Creates a clock at frame zero with a time scale of `1.0`.
    pub fn new() -> Self {
        Self {
            time_scale: 1.0,
            delta_time: 0.0,
            raw_delta_time: 0.0,
            total_time: 0.0,
            frame: 0,
        }
    }

    /// Advances the clock by one frame that took `raw_delta_time` seconds.
    pub fn advance(&mut self, raw_delta_time: f32) {
        if raw_delta_time > MAX_DELTA_TIME {
            log::debug!("Frame took {raw_delta_time:.2}s, clamping to {MAX_DELTA_TIME}s");
        }
        let raw = raw_delta_time.clamp(0.0, MAX_DELTA_TIME);
        self.raw_delta_time = raw;
        self.delta_time = raw * self.time_scale;
        self.total_time += self.delta_time;
        self.frame += 1;
    }

    /// The scaled duration of the last frame, in seconds.
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// The clamped but unscaled duration of the last frame, in seconds.
    pub fn raw_delta_time(&self) -> f32 {
        self.raw_delta_time
    }

    /// The sum of all scaled deltas so far.
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// The number of frames advanced so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The multiplier applied to raw deltas.
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Sets the multiplier applied to raw deltas. Negative values are treated as zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Resumable work that is advanced a bounded amount per call.
///
/// Implementors keep their own cursor between calls. The frame loop is the only
/// place that decides how much budget to spend per frame.
pub trait Incremental {
    /// Performs at most `budget` units of work and returns overall progress in
    /// `[0.0, 1.0]`. Once `1.0` is returned, further calls are no-ops.
    fn step(&mut self, budget: usize) -> f32;

    /// Returns `true` once all work has been performed.
    fn is_done(&self) -> bool;
}
