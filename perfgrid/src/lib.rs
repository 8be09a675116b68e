// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Command-line front-end for benchmark grids.
//!
//! Reads one benchmark CSV, resolves its columns, and writes one of:
//!
//! - `kernels`: per-configuration medians with GFLOP/s, propagated
//!   uncertainty, arithmetic intensity and cache level, plus optional
//!   build-to-build speedups;
//! - `stride`: a dense (pattern, stride) bandwidth/latency grid;
//! - `threads`: a dense thread-count bandwidth/latency grid.
//!
//! Settings are layered by [`config::Config`].

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod schema;
