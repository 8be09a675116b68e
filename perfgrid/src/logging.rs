// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::str::FromStr;

use log::LevelFilter;
use simplelog::{ConfigBuilder, SimpleLogger};

/// Take the configured string and convert it to a level filter.
#[must_use]
pub fn choose_level(lvl: &str) -> LevelFilter {
    match LevelFilter::from_str(lvl) {
        Ok(level) => level,
        Err(_) => {
            let default = LevelFilter::Error;
            eprintln!("Unable to parse level string '{lvl}', defaulting to {default}");
            default
        }
    }
}

/// Install a plain logger: no timestamps, locations, threads or targets.
pub fn init_logging(lvl: &str) -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    SimpleLogger::init(choose_level(lvl), config)?;
    Ok(())
}
