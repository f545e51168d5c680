use std::path::Path;

use super::{driver, load_config, print_report, stop_on_signal};

pub fn run(snapshot: &Path, config: &Path, ticks: Option<u64>) -> Result<(), String> {
    if !snapshot.exists() {
        return Err(format!("no snapshot at {}", snapshot.display()));
    }
    let config = load_config(config)?;
    if ticks.is_none() && config.max_ticks.is_none() {
        return Err("no tick limit: pass --ticks or set max_ticks in the config".into());
    }

    let mut sim = driver(config, snapshot);
    sim.resume()
        .map_err(|e| format!("cannot resume from {}: {e}", snapshot.display()))?;
    stop_on_signal(&sim)?;
    let report = sim
        .run(ticks)
        .map_err(|e| format!("simulation failed: {e}"))?;

    if let Some(world) = sim.world() {
        print_report(&report, world, snapshot);
    }
    Ok(())
}
