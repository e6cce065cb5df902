//! Build a stage from a config and report on it.

#![allow(clippy::print_literal)] // Table headers use literal strings

use std::path::PathBuf;

use avgraph_core::{GraphState, PadDirection, StageEvent};
use clap::Args;

use super::common::build_stage;

/// Check a stage config.
#[derive(Args)]
pub struct CheckArgs {
    /// Stage config (TOML)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Fail unless the graph is configured or waiting for its first frame
    #[arg(long)]
    pub strict: bool,
}

/// Run the check command.
pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let (config, mut built) = build_stage(&args.config)?;
    let stage = &mut built.stage;
    let state = stage.graph_state();

    println!("Config:      {}", args.config.display());
    println!("Description: {}", config.description);
    println!("Graph:       {}", state_name(state));
    if let Some(device) = stage.hw_device() {
        println!("Hardware:    {}", device.kind());
    }

    let pads: Vec<_> = stage
        .pads()
        .map(|(id, name, direction)| (id, name.to_string(), direction))
        .collect();
    if !pads.is_empty() {
        println!();
        println!("  {:12}  {:6}  {}", "Pad", "Dir", "Bound");
        println!("  {:12}  {:6}  {}", "---", "---", "-----");
        for (id, name, direction) in pads {
            let direction = match direction {
                PadDirection::Input => "in",
                PadDirection::Output => "out",
            };
            let bound = if stage.pad_is_bound(id) { "yes" } else { "no" };
            println!("  {name:12}  {direction:6}  {bound}");
        }
    }

    let failure = stage.take_events().into_iter().find_map(|event| match event {
        StageEvent::GraphFailed { message, .. } => Some(message),
        _ => None,
    });
    if let Some(message) = &failure {
        println!();
        println!("Build failed: {message}");
    }

    if args.strict && state == GraphState::Absent {
        anyhow::bail!(
            "graph is not built: {}",
            failure.as_deref().unwrap_or("pads or formats missing")
        );
    }
    Ok(())
}

/// Lower-case name of a graph state.
pub fn state_name(state: GraphState) -> &'static str {
    match state {
        GraphState::Absent => "absent",
        GraphState::Allocated => "waiting for first frame",
        GraphState::Configured => "configured",
    }
}
