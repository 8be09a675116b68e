// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Best-effort cache-size detection.
//!
//! Sizes are read from saved `lscpu` output, which reports either
//! `L1d cache: 32K` or `L1d cache: 384 KiB (8 instances)`. `lscpu` always
//! means binary units. Any level that cannot be found falls back to a named
//! default and a warning is logged.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use byte_unit::Byte;
use log::{debug, warn};
use regex::Regex;

use crate::work::DataType;

pub const DEFAULT_L1_BYTES: u64 = 32 * 1024;
pub const DEFAULT_L2_BYTES: u64 = 256 * 1024;
pub const DEFAULT_LLC_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheLevel {
    L1,
    L2,
    Llc,
    Dram,
}

impl fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheLevel::L1 => write!(f, "L1"),
            CacheLevel::L2 => write!(f, "L2"),
            CacheLevel::Llc => write!(f, "LLC"),
            CacheLevel::Dram => write!(f, "DRAM"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheSizes {
    pub l1: u64,
    pub l2: u64,
    pub llc: u64,
}

impl Default for CacheSizes {
    fn default() -> Self {
        Self {
            l1: DEFAULT_L1_BYTES,
            l2: DEFAULT_L2_BYTES,
            llc: DEFAULT_LLC_BYTES,
        }
    }
}

impl CacheSizes {
    /// Parse `lscpu` text. Never fails.
    #[must_use]
    pub fn from_lscpu(text: &str) -> Self {
        static CACHE_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r"(?im)^\s*(L1d|L2|L3) cache:\s*([0-9]+(?:\.[0-9]+)?)\s*([KMG])(?:i?B)?\b",
            )
            .unwrap()
        });

        let mut l1 = None;
        let mut l2 = None;
        let mut llc = None;
        for caps in CACHE_RE.captures_iter(text) {
            let slot = match caps[1].to_lowercase().as_str() {
                "l1d" => &mut l1,
                "l2" => &mut l2,
                _ => &mut llc,
            };
            if slot.is_some() {
                continue;
            }

            let size = format!("{} {}iB", &caps[2], caps[3].to_uppercase());
            let ignore_case = false;
            match Byte::parse_str(&size, ignore_case) {
                Ok(bytes) => {
                    debug!("{} cache is {}", &caps[1], bytes.as_u64());
                    *slot = Some(bytes.as_u64());
                }
                Err(e) => warn!("Unable to parse {} cache size '{size}': {e}", &caps[1]),
            }
        }

        Self {
            l1: or_default("L1d", l1, DEFAULT_L1_BYTES),
            l2: or_default("L2", l2, DEFAULT_L2_BYTES),
            llc: or_default("L3", llc, DEFAULT_LLC_BYTES),
        }
    }

    /// Read and parse an `lscpu` dump. An unreadable file gives the defaults.
    #[must_use]
    pub fn from_lscpu_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_lscpu(&text),
            Err(e) => {
                warn!(
                    "Unable to read {}: {e}; using default cache sizes",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Smallest level that holds `bytes`.
    #[must_use]
    pub fn level_for(&self, bytes: u64) -> CacheLevel {
        if bytes <= self.l1 {
            CacheLevel::L1
        } else if bytes <= self.l2 {
            CacheLevel::L2
        } else if bytes <= self.llc {
            CacheLevel::Llc
        } else {
            CacheLevel::Dram
        }
    }
}

/// Bytes touched by a two-operand kernel over `n` elements, saturating at
/// `u64::MAX`.
#[must_use]
pub fn working_set_bytes(n: u64, dtype: DataType) -> u64 {
    n.saturating_mul(2).saturating_mul(dtype.size_bytes())
}

fn or_default(name: &str, parsed: Option<u64>, default: u64) -> u64 {
    parsed.unwrap_or_else(|| {
        warn!("{name} cache size not found, using default of {default} bytes");
        default
    })
}
