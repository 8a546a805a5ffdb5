// MIT License
//
// Copyright (c) 2020 Gregory Meyer
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation files
// (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software,
// and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! The benchmark engine.
//!
//! [`workload`] runs the two-phase workload (parallel prefill, then a timed
//! mixed read/write phase) against any [`ConcurrentMap`] implementation.
//! [`matrix`] sweeps that workload across threads × ops × buckets ×
//! read-ratio × distribution × p_hot for both strong and weak scaling,
//! caching a sequential baseline per configuration and emitting rows in a
//! stable CSV schema.
//!
//! [`ConcurrentMap`]: crate::table::ConcurrentMap

pub mod matrix;
pub mod workload;

pub use matrix::{
    echo_affinity_env, print_csv, sweep, BaselineCache, MatrixConfig, Row, ScalingMode, CSV_HEADER,
};
pub use workload::{run_workload, run_workload_sequential, Distribution, Workload};
