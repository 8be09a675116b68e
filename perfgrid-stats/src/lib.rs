// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Statistics over normalised benchmark tables.
//!
//! - [`aggregate`] collapses repeated trials into one summary per
//!   configuration.
//! - [`derive`] turns timings into throughput with propagated uncertainty.
//! - [`work`] knows how much work each kernel performs.
//! - [`cache_info`] classifies working sets against the host's caches.

pub mod aggregate;
pub mod cache_info;
pub mod derive;
pub mod work;
