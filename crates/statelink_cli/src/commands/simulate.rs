//! Simulate command implementation.
//!
//! Runs a counter primary and a set of replicas over the in-memory hub and
//! reports whether every replica converged.

use super::Format;
use serde::Serialize;
use statelink_replica::ReplicaConfig;
use statelink_store::{Action, StateContainer};
use statelink_testkit::{counter_primary, settle, without_marker, MemoryHub, TestReplica};
use std::sync::Arc;
use tracing::{debug, info};

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Number of replicas.
    pub replicas: usize,
    /// Number of primary dispatches.
    pub dispatches: usize,
    /// Drop one replica connection every this many dispatches (0 disables).
    pub drop_every: usize,
    /// Channel the replicas announce.
    pub channel: String,
}

/// Simulation report.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// Replicas simulated.
    pub replicas: usize,
    /// Dispatches performed.
    pub dispatches: usize,
    /// Patch batches broadcast by the primary.
    pub broadcasts: u64,
    /// Full-sync requests sent by all replicas.
    pub requests_sent: u64,
    /// Patches applied by all replicas.
    pub patches_applied: u64,
    /// Snapshots applied by all replicas.
    pub snapshots_applied: u64,
    /// Reconnects across all replicas.
    pub reconnects: u64,
    /// Replicas whose tree matches the primary.
    pub converged: usize,
    /// Final primary tree.
    pub final_state: serde_json::Value,
}

/// Runs the simulation.
pub fn simulate(options: &SimulateOptions) -> SimulationReport {
    let primary = counter_primary();
    let hub = MemoryHub::new(Arc::clone(&primary));
    let config = ReplicaConfig::new(options.channel.clone());
    let mut replicas: Vec<_> = (0..options.replicas)
        .map(|_| TestReplica::start_with(&hub, config.clone()))
        .collect();
    settle(&hub, &mut replicas);

    for i in 0..options.dispatches {
        primary.dispatch(Action::new("counter/increment"));

        if options.drop_every > 0 && (i + 1) % options.drop_every == 0 && !replicas.is_empty() {
            let victim = i % replicas.len();
            if let Some(handle) = replicas[victim].session.handle_id() {
                debug!(replica = victim, %handle, "dropping connection");
                hub.drop_connection(handle);
            }
        }
        settle(&hub, &mut replicas);
    }

    // Replicas that never connected retry on their timers.
    for replica in replicas.iter_mut() {
        replica.session.on_retry_tick();
    }
    settle(&hub, &mut replicas);

    let expected = primary.get_state();
    let mut report = SimulationReport {
        replicas: replicas.len(),
        dispatches: options.dispatches,
        broadcasts: primary.fanout().stats().broadcasts,
        requests_sent: 0,
        patches_applied: 0,
        snapshots_applied: 0,
        reconnects: 0,
        converged: 0,
        final_state: (*expected).clone(),
    };
    for replica in &replicas {
        let stats = replica.session.stats();
        report.requests_sent += stats.requests_sent;
        report.patches_applied += stats.patches_applied;
        report.snapshots_applied += stats.snapshots_applied;
        report.reconnects += stats.reconnects;
        if without_marker(&replica.state()) == *expected {
            report.converged += 1;
        }
    }

    info!(
        converged = report.converged,
        replicas = report.replicas,
        "simulation finished"
    );
    report
}

/// Runs the simulate command.
pub fn run(options: &SimulateOptions, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let report = simulate(options);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            println!("Simulation");
            println!("  Replicas:      {}", report.replicas);
            println!("  Dispatches:    {}", report.dispatches);
            println!("  Broadcasts:    {}", report.broadcasts);
            println!("  Sync requests: {}", report.requests_sent);
            println!("  Patches:       {}", report.patches_applied);
            println!("  Snapshots:     {}", report.snapshots_applied);
            println!("  Reconnects:    {}", report.reconnects);
            println!();
            println!("  Converged:     {}/{}", report.converged, report.replicas);
        }
    }

    if report.converged != report.replicas {
        return Err("not every replica converged".into());
    }
    Ok(())
}
