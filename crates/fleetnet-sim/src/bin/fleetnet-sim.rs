//! FleetNet Simulator
//!
//! Run a seeded gossip election and print the outcome.
//!
//! ```text
//! fleetnet-sim [config.json] [--json]
//! fleetnet-sim <nodes> <rounds> <seed> [--json]
//! ```

use std::env;

use fleetnet_sim::{SimEvent, Simulation, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetnet_sim=info,fleetnet_consensus=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line args
    let args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let config = match positional.as_slice() {
        [] => SimulationConfig::default(),
        [path] => SimulationConfig::load(path.as_str())?,
        [nodes, rounds, seed, ..] => SimulationConfig::default()
            .with_nodes(nodes.parse()?)
            .with_rounds(rounds.parse()?)
            .with_seed(seed.parse()?),
        _ => return Err("usage: fleetnet-sim [config.json] | <nodes> <rounds> <seed> [--json]".into()),
    };

    println!("FleetNet Simulator");
    println!("==================");
    println!();
    println!(
        "Running {} nodes for {} rounds (seed {})...",
        config.node_count, config.rounds, config.seed
    );

    let mut sim = Simulation::new(config)?;
    let rounds = sim.config().rounds;
    while sim.round() < rounds {
        let summary = sim.step()?;
        if summary.round % 10 == 0 {
            println!("  Round {}: {} messages", summary.round, summary.messages_sent);
        }
    }
    let report = sim.report();

    println!();
    println!("Simulation complete:");
    println!("  Rounds: {}", report.rounds);
    println!("  Messages: {}", report.messages_sent);
    println!("  Byzantine: {}", sim.scheduler().byzantine_set().len());
    println!("  Events: {}", sim.event_count());
    match report.agreed_leader {
        Some(leader) => println!("  Agreed leader: {}", leader),
        None => println!("  Agreed leader: none"),
    }
    match report.converged_at {
        Some(round) => println!("  Converged at round {}", round),
        None => println!("  Not converged"),
    }
    println!("  Stable for {} rounds", report.stable_rounds);

    let deaths = sim
        .events()
        .iter()
        .filter(|e| matches!(e, SimEvent::NodeDied { .. }))
        .count();
    if deaths > 0 {
        println!("  Deaths: {}", deaths);
    }

    println!();
    for (id, view) in &report.snapshot.nodes {
        let leader = view.current_leader.map_or_else(|| "-".to_string(), |l| l.to_string());
        let role = if view.byzantine { " (byzantine)" } else { "" };
        println!("  {} [{}] leader {}{}", id, view.status, leader, role);
    }

    if json {
        println!();
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
