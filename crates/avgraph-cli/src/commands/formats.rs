//! List pixel and sample formats with their pipeline flow definitions.

#![allow(clippy::print_literal)] // Table headers use literal strings

use avgraph_core::formats::{
    pixel_planes, plane_sample_size, sample_format_tag, sound_plane_names, surface_type,
};
use avgraph_engine::{PixelFormat, SampleFormat};
use clap::Args;
use serde::Serialize;

/// List formats.
#[derive(Args)]
pub struct FormatsArgs {
    /// Print the table as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct PixelRow {
    name: &'static str,
    hardware: bool,
    /// Plane chroma names, or the surface type of hardware formats.
    flow: String,
}

#[derive(Debug, Serialize)]
struct SampleRow {
    name: &'static str,
    planar: bool,
    flow: String,
    /// Stereo plane names.
    planes: Vec<String>,
    sample_size: usize,
}

#[derive(Debug, Serialize)]
struct Table {
    pixel_formats: Vec<PixelRow>,
    sample_formats: Vec<SampleRow>,
}

fn table() -> Table {
    let pixel_formats = PixelFormat::ALL
        .into_iter()
        .map(|format| {
            let flow = match pixel_planes(format) {
                Some(planes) => planes
                    .iter()
                    .map(|p| p.chroma.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                None => surface_type(format),
            };
            PixelRow {
                name: format.name(),
                hardware: format.is_hw(),
                flow,
            }
        })
        .collect();

    let sample_formats = SampleFormat::ALL
        .into_iter()
        .map(|format| SampleRow {
            name: format.name(),
            planar: format.is_planar(),
            flow: format!("sound.{}.", sample_format_tag(format)),
            planes: sound_plane_names(format, 2),
            sample_size: plane_sample_size(format, 2),
        })
        .collect();

    Table {
        pixel_formats,
        sample_formats,
    }
}

/// Run the formats command.
pub fn run(args: FormatsArgs) -> anyhow::Result<()> {
    let table = table();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("Pixel Formats");
    println!("=============");
    println!();
    println!("  {:12}  {:4}  {}", "Name", "HW", "Planes / surface");
    println!("  {:12}  {:4}  {}", "----", "--", "----------------");
    for row in &table.pixel_formats {
        let hw = if row.hardware { "yes" } else { "" };
        println!("  {:12}  {:4}  {}", row.name, hw, row.flow);
    }

    println!();
    println!("Sample Formats (stereo)");
    println!("=======================");
    println!();
    println!("  {:6}  {:12}  {:6}  {}", "Name", "Definition", "Size", "Planes");
    println!("  {:6}  {:12}  {:6}  {}", "----", "----------", "----", "------");
    for row in &table.sample_formats {
        println!(
            "  {:6}  {:12}  {:6}  {}",
            row.name,
            row.flow,
            row.sample_size,
            row.planes.join(" ")
        );
    }
    Ok(())
}
