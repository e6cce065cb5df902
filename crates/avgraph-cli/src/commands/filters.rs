//! List the filters of the reference engine.

use super::common::engine;

/// Run the filters command.
pub fn run() -> anyhow::Result<()> {
    let engine = engine();
    let mut names = engine.filter_names();
    names.sort_unstable();

    println!("Filters ({} engine)", engine.name());
    println!("=================");
    println!();
    for name in names {
        println!("  {name}");
    }
    Ok(())
}
