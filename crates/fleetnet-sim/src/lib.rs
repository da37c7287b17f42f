//! FleetNet Simulation
//!
//! Seeded, reproducible runs of the gossip election protocol.
//!
//! # Architecture
//!
//! - **Config**: graph shape, Byzantine share and strategy, scheduled deaths
//! - **Simulation**: generates the graph, marks Byzantine nodes, drives rounds
//! - **Events**: a timeline of deaths, leader changes and convergence
//!
//! # Usage
//!
//! ```no_run
//! use fleetnet_sim::{Simulation, SimulationConfig};
//!
//! let config = SimulationConfig::default().with_nodes(50).with_rounds(100);
//! let mut sim = Simulation::new(config)?;
//! let report = sim.run()?;
//! println!("leader: {:?}", report.agreed_leader);
//! # Ok::<(), fleetnet_sim::SimError>(())
//! ```

mod config;
mod error;
mod events;
mod simulation;

pub use config::{ScheduledDeath, SimulationConfig};
pub use error::{Result, SimError};
pub use events::SimEvent;
pub use simulation::{Simulation, SimulationReport};
