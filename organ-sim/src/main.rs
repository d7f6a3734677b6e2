//! Command line driver: grows one plant from a scenario file and reports the
//! resulting organs.

mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use organ_core::phases::{step, step_limited};
use organ_core::tree::OrganTree;
use organ_core::types::OrganKind;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use scenario::Scenario;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file (RON); the bundled maize seedling if omitted
    scenario: Option<PathBuf>,

    /// Override the step size [day]
    #[arg(long)]
    dt: Option<f64>,

    /// Override the simulated time span [day]
    #[arg(long)]
    sim_time: Option<f64>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Cap the plant's total elongation per step [cm]
    #[arg(long)]
    max_increment: Option<f64>,

    /// Print one line per organ
    #[arg(long)]
    list: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut scenario = match &args.scenario {
        Some(path) => Scenario::from_file(path)?,
        None => Scenario::bundled()?,
    };
    if let Some(dt) = args.dt {
        scenario.config.dt = dt;
    }
    if let Some(sim_time) = args.sim_time {
        scenario.config.sim_time = sim_time;
    }
    if let Some(seed) = args.seed {
        scenario.config.seed = seed;
    }

    let tree = run(&scenario, args.max_increment)?;
    report(&tree, args.list)
}

fn run(scenario: &Scenario, max_increment: Option<f64>) -> Result<OrganTree> {
    let cfg = &scenario.config;
    log::info!(
        "{}: {} steps of {} days, seed {}",
        scenario.name,
        cfg.steps(),
        cfg.dt,
        cfg.seed
    );

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(cfg.seed);
    let mut tree = OrganTree::new(scenario.parameter_set());
    tree.branching_scale = scenario.branching_scale.clone();
    tree.elongation_scale = scenario.elongation_scale.clone();
    tree.initialize(cfg, &mut rng).context("Failed to create base organs")?;

    for i in 0..cfg.steps() {
        let dt = cfg.step_size(i);
        match max_increment {
            Some(max) => {
                let scale = step_limited(&mut tree, dt, max, &mut rng).with_context(|| format!("Step {i} failed"))?;
                if scale < 1.0 {
                    log::debug!("step {i}: elongation scaled by {scale:.3}");
                }
            }
            None => step(&mut tree, dt, &mut rng).with_context(|| format!("Step {i} failed"))?,
        }
        log::debug!("t = {:.2}: {} organs, {} nodes", tree.time(), tree.len(), tree.number_of_node_ids());
    }
    Ok(tree)
}

fn report(tree: &OrganTree, list: bool) -> Result<()> {
    println!("simulated {:.2} days, {} organs, {} nodes", tree.time(), tree.len(), tree.number_of_node_ids());
    for kind in [OrganKind::Root, OrganKind::Stem, OrganKind::Leaf] {
        let organs = tree.organs(Some(kind));
        if organs.is_empty() {
            continue;
        }
        let length: f64 = organs.iter().map(|o| o.realized_length()).sum();
        let volume: f64 = organs.iter().map(|o| o.volume()).sum();
        let surface: f64 = organs.iter().map(|o| o.surface()).sum();
        println!(
            "{kind}: {} organs, length {length:.2} cm, volume {volume:.3} cm3, surface {surface:.2} cm2",
            organs.len()
        );
    }

    if list {
        for organ in tree.iter() {
            let order = tree.order(organ.id())?;
            println!("{}{organ}", "  ".repeat(order));
        }
    }
    Ok(())
}
