use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use tw_core::{Modifier, NeedsComponent, PressureComponent, WorldState};
use tw_sim::{JsonFileStore, SnapshotStore};

use super::resource_table;

pub fn run(snapshot: &Path, all: bool) -> Result<(), String> {
    let loaded = JsonFileStore::new(snapshot)
        .load_snapshot()
        .map_err(|e| format!("cannot read {}: {e}", snapshot.display()))?
        .ok_or_else(|| format!("no snapshot at {}", snapshot.display()))?;
    let world = WorldState::from_snapshot(loaded)
        .map_err(|e| format!("invalid snapshot {}: {e}", snapshot.display()))?;

    println!();
    println!("  {}", "World".bold().underline());
    println!(
        "  Tick {} ({})",
        world.tick().to_string().cyan(),
        world.now().format("%Y-%m-%d %H:%M")
    );
    let modules = world.module_ids();
    if modules.is_empty() {
        println!("  Modules: {}", "none".dimmed());
    } else {
        println!("  Modules: {}", modules.join(", "));
    }
    println!();

    println!("  {}", "Resources".bold().underline());
    println!("{}", resource_table(&world));
    println!();

    println!("  {}", "Modifiers".bold().underline());
    let modifiers: Vec<&Modifier> = world
        .modifiers()
        .filter(|m| all || m.is_flagged_active())
        .collect();
    if modifiers.is_empty() {
        println!("  {}", "No modifiers.".dimmed());
    } else {
        println!("{}", modifier_table(&world, &modifiers));
    }
    println!();

    println!("  {}", "Entities".bold().underline());
    if world.entity_count() == 0 {
        println!("  {}", "No entities.".dimmed());
    } else {
        println!("{}", entity_table(&world));
        print_needs(&world);
        print_pressure(&world);
    }
    println!();
    Ok(())
}

fn modifier_table(world: &WorldState, modifiers: &[&Modifier]) -> Table {
    let now = world.now();
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Target", "Effect", "Years", "State", "Renewal"]);
    for m in modifiers {
        let state = if !m.is_flagged_active() {
            if m.successor().is_some() {
                "renewed".dimmed().to_string()
            } else {
                "expired".dimmed().to_string()
            }
        } else if m.is_active(now) {
            "active".green().to_string()
        } else {
            "pending".yellow().to_string()
        };
        let renewal = m
            .renewal
            .as_ref()
            .map(|r| format!("{:.0}% {}", r.probability * 100.0, r.frequency))
            .unwrap_or_else(|| "--".to_string());
        table.add_row(vec![
            m.id.to_string(),
            m.name.clone(),
            m.target.to_string(),
            m.effect.to_string(),
            format!("{}-{}", m.start_period(), m.end_period()),
            state,
            renewal,
        ]);
    }
    table
}

fn entity_table(world: &WorldState) -> Table {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entity in world.entities() {
        for name in entity.component_names() {
            *counts.entry(name).or_default() += 1;
        }
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Component", "Entities"]);
    for (name, count) in counts {
        table.add_row(vec![name.to_string(), count.to_string()]);
    }
    table.add_row(vec![
        "(total)".bold().to_string(),
        world.entity_count().to_string().bold().to_string(),
    ]);
    table
}

fn print_needs(world: &WorldState) {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (_, needs) in world.query::<NeedsComponent>() {
        for (name, state) in &needs.needs {
            let entry = totals.entry(name.as_str()).or_default();
            entry.0 += state.level;
            entry.1 += 1;
        }
    }
    for (name, (sum, count)) in totals {
        let mean = sum / count as f64;
        let shown = format!("{mean:.2}");
        let shown = if mean > 0.8 {
            shown.red().to_string()
        } else if mean > 0.5 {
            shown.yellow().to_string()
        } else {
            shown.green().to_string()
        };
        println!("  Mean {name}: {shown} over {count} entities");
    }
}

fn print_pressure(world: &WorldState) {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for (_, pressure) in world.query::<PressureComponent>() {
        for (requirement, unmet) in &pressure.unmet {
            *totals.entry(requirement.as_str()).or_default() += unmet;
        }
    }
    for (requirement, unmet) in totals {
        println!("  {} {requirement}: {unmet:.2} unmet", "PRESSURE".red().bold());
    }
}
