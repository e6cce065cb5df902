//! Push synthetic media through a stage and report on its outputs.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};

use anyhow::Context;
use avgraph_config::BuiltStage;
use avgraph_core::names::pixel_format_name;
use avgraph_core::{FilterStage, OutputEvent, PadId, StageEvent};
use avgraph_media::{BufferAllocator, FlowDef};
use clap::Args;
use serde::Serialize;

use super::check::state_name;
use super::common::build_stage;
use crate::synth;

/// Run a stage.
#[derive(Args)]
pub struct RunArgs {
    /// Stage config (TOML)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Buffers to push into each input
    #[arg(short = 'n', long, default_value_t = 25)]
    pub frames: u64,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// What one output produced.
#[derive(Debug, Serialize)]
struct OutputReport {
    name: String,
    format: Option<String>,
    /// Engine pixel format of picture outputs.
    pixel_format: Option<String>,
    flow_defs: u64,
    buffers: u64,
    first_pts: Option<u64>,
    last_pts: Option<u64>,
    /// Program time strictly increased from buffer to buffer.
    increasing: bool,
    latency: u64,
}

#[derive(Debug, Serialize)]
struct Report {
    description: String,
    graph: &'static str,
    frames: u64,
    errors: Vec<String>,
    outputs: Vec<OutputReport>,
}

/// Where synthetic buffers go in.
enum Feed {
    Main(FlowDef),
    Pad(PadId, FlowDef),
}

struct Tap {
    name: String,
    pad: Option<PadId>,
    rx: Receiver<OutputEvent>,
}

impl Tap {
    fn report(&self, stage: &FilterStage) -> OutputReport {
        let mut report = OutputReport {
            name: self.name.clone(),
            format: None,
            pixel_format: None,
            flow_defs: 0,
            buffers: 0,
            first_pts: None,
            last_pts: None,
            increasing: true,
            latency: 0,
        };
        for event in self.rx.try_iter() {
            match event {
                OutputEvent::FlowDef(flow) => {
                    report.flow_defs += 1;
                    report.format = flow.def().map(str::to_string);
                    report.pixel_format = pixel_format_name(&flow, false).ok().map(str::to_string);
                    report.latency = flow.latency();
                }
                OutputEvent::Buffer(buffer) => {
                    report.buffers += 1;
                    let pts = buffer.attrs.pts_prog;
                    if let (Some(last), Some(pts)) = (report.last_pts, pts)
                        && pts <= last
                    {
                        report.increasing = false;
                    }
                    report.first_pts = report.first_pts.or(pts);
                    report.last_pts = pts.or(report.last_pts);
                }
            }
        }
        if let Some(latency) = self.pad.and_then(|id| stage.pad_latency(id)) {
            report.latency = latency;
        }
        report
    }
}

/// Run the run command.
pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let (config, built) = build_stage(&args.config)?;
    let BuiltStage {
        mut stage,
        inputs,
        outputs,
    } = built;

    let alloc = BufferAllocator::new();
    stage.set_allocator(alloc.clone());

    let mut feeds = Vec::new();
    let mut taps = Vec::new();
    if let Some(flow) = stage.input_format().cloned() {
        feeds.push(Feed::Main(flow));
        let (tx, rx) = mpsc::channel();
        stage.attach_main_output(Box::new(tx));
        taps.push(Tap {
            name: "main".to_string(),
            pad: None,
            rx,
        });
    }
    for (name, id) in &inputs {
        match stage.pad_flow_def(*id).cloned() {
            Some(flow) => feeds.push(Feed::Pad(*id, flow)),
            None => tracing::warn!(pad = %name, "input has no format, nothing to push"),
        }
    }
    for (name, id) in &outputs {
        let (tx, rx) = mpsc::channel();
        stage
            .attach_output(*id, Box::new(tx))
            .with_context(|| format!("cannot attach output '{name}'"))?;
        taps.push(Tap {
            name: name.clone(),
            pad: Some(*id),
            rx,
        });
    }

    for index in 0..args.frames {
        for feed in &feeds {
            match feed {
                Feed::Main(flow) => {
                    let buffer = synth::buffer(&alloc, flow, index)?;
                    stage.push(buffer).context("input rejected a buffer")?;
                }
                Feed::Pad(id, flow) => {
                    let buffer = synth::buffer(&alloc, flow, index)?;
                    stage
                        .push_input(*id, buffer)
                        .with_context(|| format!("pad {id} rejected a buffer"))?;
                }
            }
        }
    }
    stage.poll();

    let errors = stage
        .take_events()
        .into_iter()
        .filter_map(|event| match event {
            StageEvent::GraphFailed { message, .. } | StageEvent::Error { message, .. } => {
                Some(message)
            }
            _ => None,
        })
        .collect();
    let report = Report {
        description: config.description.clone(),
        graph: state_name(stage.graph_state()),
        frames: args.frames,
        errors,
        outputs: taps.iter().map(|tap| tap.report(&stage)).collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!("Description: {}", report.description);
    println!("Graph:       {}", report.graph);
    println!("Pushed:      {} per input", report.frames);
    println!();
    for output in &report.outputs {
        println!("{}", output.name);
        println!("  Format:    {}", output.format.as_deref().unwrap_or("-"));
        if let Some(pixels) = &output.pixel_format {
            println!("  Pixels:    {pixels}");
        }
        println!("  Buffers:   {}", output.buffers);
        if let (Some(first), Some(last)) = (output.first_pts, output.last_pts) {
            println!("  Program:   {first} .. {last}");
        }
        println!(
            "  Increasing: {}",
            if output.increasing { "yes" } else { "no" }
        );
        println!("  Latency:   {}", output.latency);
    }
    for error in &report.errors {
        println!("error: {error}");
    }
}
