pub mod add_modifier;
pub mod inspect;
pub mod resume;
pub mod run;

use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use tw_core::{ResourceStatus, WorldState};
use tw_sim::{JsonFileStore, ModuleRegistry, RunReport, SimConfig, Simulation, StopReason};

/// Load and validate a config file.
fn load_config(path: &Path) -> Result<SimConfig, String> {
    SimConfig::from_path(path).map_err(|e| format!("cannot load config {}: {e}", path.display()))
}

/// A driver wired to the built-in modules and a JSON snapshot file.
fn driver(config: SimConfig, snapshot: &Path) -> Simulation {
    Simulation::new(
        config,
        ModuleRegistry::with_builtins(),
        JsonFileStore::new(snapshot),
    )
}

/// Route SIGINT/SIGTERM to the driver's stop handle.
///
/// The run then ends after the current tick and still writes its final
/// snapshot, so an interrupted run can be resumed.
fn stop_on_signal(sim: &Simulation) -> Result<(), String> {
    let stop = sim.stop_handle();
    ctrlc::set_handler(move || stop.request_stop())
        .map_err(|e| format!("cannot install signal handler: {e}"))?;
    tracing::info!("press Ctrl-C to stop and save");
    Ok(())
}

/// Print the outcome of a run followed by the resource table.
fn print_report(report: &RunReport, world: &WorldState, snapshot: &Path) {
    let reason = match report.stop_reason {
        StopReason::TickLimit => "tick limit reached",
        StopReason::StopRequested => "stop requested",
    };
    println!();
    println!("  {}", "Simulation Report".bold().underline());
    println!(
        "  Ran {} ticks, now at tick {} ({}), {reason}",
        report.ticks_run.to_string().cyan(),
        report.final_tick.to_string().cyan(),
        report.now.format("%Y-%m-%d %H:%M")
    );
    println!("  Snapshot saved to {}", snapshot.display().to_string().green());
    println!();
    println!("{}", resource_table(world));
    println!();
}

fn resource_table(world: &WorldState) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Resource", "Amount", "Capacity", "Status"]);
    for resource in world.resources() {
        table.add_row(vec![
            resource.id.clone(),
            format!("{:.2}", resource.amount()),
            resource
                .max_capacity()
                .map(|cap| format!("{cap:.0}"))
                .unwrap_or_else(|| "--".to_string()),
            colored_status(resource.status()),
        ]);
    }
    table
}

fn colored_status(status: ResourceStatus) -> String {
    let label = status.to_string();
    match status {
        ResourceStatus::Depleted => label.red().bold().to_string(),
        ResourceStatus::AtRisk => label.red().to_string(),
        ResourceStatus::Moderate => label.yellow().to_string(),
        ResourceStatus::Sufficient => label.green().to_string(),
        ResourceStatus::Abundant => label.green().bold().to_string(),
    }
}
