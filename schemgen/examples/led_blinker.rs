//! Build a schematic from a description file and write it next to the input.

use schemgen::prelude::*;
use std::path::Path;

const BLINKER: &str = r#"circuit "LED Blinker":
  components:
    - R1: resistor 220 at (20, 30)
    - LED1: led red at (50, 30)
  connections:
    - R1.2 → LED1.anode
"#;

fn main() -> Result<(), SchemGenError> {
    let (text, out_path) = match std::env::args().nth(1) {
        Some(path) => {
            let path = Path::new(&path);
            (std::fs::read_to_string(path)?, path.with_extension("kicad_sch"))
        }
        None => (BLINKER.to_string(), Path::new("led_blinker.kicad_sch").to_path_buf()),
    };

    let options = BuildOptions {
        routing_strategy: RouteStrategy::Manhattan,
        ..Default::default()
    };
    let output = SchemGen::build(&text, &options)?;
    std::fs::write(&out_path, &output.schematic)?;

    println!("Circuit: {}", output.circuit.name);
    println!("Wrote {} ({} nets, {} wires)", out_path.display(), output.nets.len(), output.wire_count());
    for diagnostic in &output.diagnostics {
        println!("  - {}", diagnostic);
    }

    if output.has_boundary_errors() {
        println!("\nSome components were moved back onto the page.");
    }
    Ok(())
}
