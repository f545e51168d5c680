use std::path::Path;

use super::{driver, load_config, print_report, stop_on_signal};

pub fn run(config: &Path, snapshot: &Path, ticks: Option<u64>) -> Result<(), String> {
    let config = load_config(config)?;
    if ticks.is_none() && config.max_ticks.is_none() {
        return Err("no tick limit: pass --ticks or set max_ticks in the config".into());
    }

    let mut sim = driver(config, snapshot);
    sim.start_new().map_err(|e| format!("cannot start: {e}"))?;
    stop_on_signal(&sim)?;
    let report = sim
        .run(ticks)
        .map_err(|e| format!("simulation failed: {e}"))?;

    if let Some(world) = sim.world() {
        print_report(&report, world, snapshot);
    }
    Ok(())
}
