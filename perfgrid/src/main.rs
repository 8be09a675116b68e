// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use perfgrid::config::Config;
use perfgrid::logging::init_logging;
use perfgrid::pipeline::run;

fn main() -> anyhow::Result<()> {
    let config = Config::parse_all_sources()?;
    init_logging(config.log_level.as_deref().unwrap_or("warn"))?;

    let settings = config.settings()?;
    run(&settings)?;
    Ok(())
}
