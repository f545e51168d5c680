use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use tw_core::{
    Direction, Frequency, ModifierEffect, ModifierSpec, ModifierTarget, RenewalPolicy, WorldState,
};
use tw_sim::{JsonFileStore, SnapshotStore};

/// Flags of `tw add-modifier`.
#[derive(Args)]
pub struct AddModifierArgs {
    /// Modifier name (shared by all of its renewals)
    name: String,

    /// Target a global resource by id
    #[arg(long, conflicts_with = "module")]
    resource: Option<String>,

    /// Target a behavior module by id
    #[arg(long)]
    module: Option<String>,

    /// Effect kind: percentage, direct
    #[arg(long, default_value = "percentage")]
    kind: String,

    /// Fraction for percentage effects (0.3 = 30%), units for direct ones
    #[arg(long)]
    magnitude: f64,

    /// Effect direction: increase, decrease
    #[arg(long, default_value = "decrease")]
    direction: String,

    /// First active year
    #[arg(long)]
    start: i32,

    /// First year no longer active
    #[arg(long)]
    end: i32,

    /// Chance of renewal when the window ends (omit for no renewal)
    #[arg(long)]
    renew_probability: Option<f64>,

    /// How often renewal is rolled: hourly, daily, weekly, monthly, yearly
    #[arg(long, default_value = "yearly")]
    renew_frequency: String,

    /// Length of renewed windows in years (default: same as the original)
    #[arg(long)]
    renew_duration: Option<i32>,

    /// Snapshot file to modify
    #[arg(short, long, default_value = "world.json")]
    snapshot: PathBuf,
}

impl AddModifierArgs {
    fn to_spec(&self) -> Result<ModifierSpec, String> {
        let target = match (&self.resource, &self.module) {
            (Some(id), None) => ModifierTarget::Resource(id.clone()),
            (None, Some(id)) => ModifierTarget::Module(id.clone()),
            _ => return Err("pass exactly one of --resource or --module".into()),
        };
        let direction = match self.direction.to_ascii_lowercase().as_str() {
            "increase" => Direction::Increase,
            "decrease" => Direction::Decrease,
            other => {
                return Err(format!(
                    "unknown direction \"{other}\" (use increase or decrease)"
                ));
            }
        };
        let effect = match self.kind.to_ascii_lowercase().as_str() {
            "percentage" => ModifierEffect::percentage(self.magnitude, direction),
            "direct" => ModifierEffect::direct(self.magnitude, direction),
            other => {
                return Err(format!(
                    "unknown effect kind \"{other}\" (use percentage or direct)"
                ));
            }
        };

        let mut spec = ModifierSpec::new(&self.name, target, effect, self.start, self.end);
        if let Some(probability) = self.renew_probability {
            let frequency = self
                .renew_frequency
                .parse::<Frequency>()
                .map_err(|e| e.to_string())?;
            let mut policy = RenewalPolicy::new(probability, frequency);
            if let Some(years) = self.renew_duration {
                policy = policy.with_duration(years);
            }
            spec = spec.with_renewal(policy);
        }
        Ok(spec)
    }
}

/// The target must already exist in the world.
fn check_target(world: &WorldState, target: &ModifierTarget) -> Result<(), String> {
    match target {
        ModifierTarget::Resource(id) if world.resource(id).is_none() => {
            let known: Vec<&str> = world.resources().map(|r| r.id.as_str()).collect();
            Err(format!("unknown resource \"{id}\" (known: {})", known.join(", ")))
        }
        ModifierTarget::Module(id) if !world.module_ids().contains(id) => Err(format!(
            "module \"{id}\" is not attached (attached: {})",
            world.module_ids().join(", ")
        )),
        _ => Ok(()),
    }
}

pub fn run(args: &AddModifierArgs) -> Result<(), String> {
    let spec = args.to_spec()?;
    let mut store = JsonFileStore::new(&args.snapshot);
    let snapshot = store
        .load_snapshot()
        .map_err(|e| format!("cannot read {}: {e}", args.snapshot.display()))?
        .ok_or_else(|| format!("no snapshot at {}", args.snapshot.display()))?;
    let mut world = WorldState::from_snapshot(snapshot)
        .map_err(|e| format!("cannot restore {}: {e}", args.snapshot.display()))?;

    check_target(&world, &spec.target)?;
    let summary = format!("{} on {}", spec.effect, spec.target);
    let id = world
        .add_modifier(spec)
        .map_err(|e| format!("invalid modifier: {e}"))?;
    store
        .save_snapshot(&world.to_snapshot())
        .map_err(|e| format!("cannot save {}: {e}", args.snapshot.display()))?;

    println!(
        "  Added modifier {} ({}) {summary}, years {}..{}",
        args.name.bold(),
        id.to_string().cyan(),
        args.start,
        args.end
    );
    println!(
        "  Snapshot saved to {}",
        args.snapshot.display().to_string().green()
    );
    Ok(())
}
