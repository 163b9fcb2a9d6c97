//! Snapshot archive tool.
//!
//! Usage: blockpack <COMMAND> [OPTIONS]
//!
//! Commands:
//!   info <FILE>                 Print stats, bounds and comments of an archive
//!   export <FILE>               Print an archive as a base64 transport string
//!   import <TEXT_FILE> <OUT>    Decode a base64 string and save it as an archive
//!   demo <OUT>                  Build a small sample village and save it
//!
//! Options:
//!   --config <PATH>   Pack config JSON used by `demo` (default: built-in)
//!   --commands        With `info`, also list every replayed command

use std::path::Path;
use std::time::Instant;

use blockpack::codec;
use blockpack::core::logging;
use blockpack::pack::Layer;
use blockpack::{Accumulator, BlockCommand, IVec3, PackConfig, Result, Snapshot, Transform};

fn main() {
    logging::init_with_timestamps();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let positional: Vec<&str> = positional_args(args);
    match positional.as_slice() {
        ["info", file] => info(Path::new(file), has_flag(args, "--commands")),
        ["export", file] => {
            let snapshot = codec::read_archive(file)?;
            println!("{}", codec::export_string(&snapshot)?);
            Ok(())
        }
        ["import", text_file, out] => {
            let text = std::fs::read_to_string(text_file)?;
            let snapshot = codec::import_string(&text)?;
            codec::write_archive(out, &snapshot)?;
            print_summary(&snapshot);
            Ok(())
        }
        ["demo", out] => {
            let config = match parse_str_arg(args, "--config") {
                Some(path) => PackConfig::load(path)?,
                None => PackConfig::default(),
            };
            demo(Path::new(out), &config)
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn info(path: &Path, list_commands: bool) -> Result<()> {
    let snapshot = codec::read_archive(path)?;
    println!("=== {} ===", path.display());
    print_summary(&snapshot);

    if list_commands {
        let mut commands: Vec<BlockCommand> = Vec::new();
        snapshot.replay(&Transform::IDENTITY, &mut commands)?;
        println!();
        for cmd in &commands {
            match cmd {
                BlockCommand::Setblock { pos, block_type } => {
                    println!("setblock {} {} {} {}", pos.x, pos.y, pos.z, block_type);
                }
                BlockCommand::Fill { min, max, block_type } => {
                    println!(
                        "fill {} {} {} {} {} {} {}",
                        min.x, min.y, min.z, max.x, max.y, max.z, block_type
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_summary(snapshot: &Snapshot) {
    let stats = snapshot.stats();
    println!("Tiles:     {}", stats.tiles);
    println!("Fills:     {}", stats.fills);
    println!("Setblocks: {}", stats.setblocks);
    println!("Types:     {}", stats.symbols);
    match snapshot.block_bounds() {
        Some((min, max)) => println!("Bounds:    {} .. {}", min, max),
        None => println!("Bounds:    (empty)"),
    }
    for (key, value) in snapshot.comments() {
        println!("  {}: {}", key, value);
    }
}

/// One cottage: stone floor, plank walls with a doorway and windows, sand roof
fn cottage(acc: &mut Accumulator) -> Result<()> {
    acc.fill(IVec3::new(0, 0, 0), IVec3::new(6, 0, 6), "cobblestone")?;
    acc.fill(IVec3::new(0, 1, 0), IVec3::new(6, 3, 6), "oak_planks")?;
    acc.fill(IVec3::new(1, 1, 1), IVec3::new(5, 3, 5), "")?;
    acc.fill(IVec3::new(3, 1, 0), IVec3::new(3, 2, 0), "")?;
    for x in [1, 5] {
        acc.setblock(IVec3::new(x, 2, 0), "glass_pane")?;
    }
    acc.fill(IVec3::new(0, 4, 0), IVec3::new(6, 4, 6), "sand")?;
    acc.setblock(IVec3::new(3, 1, 3), "crafting_table")?;
    Ok(())
}

fn demo(out: &Path, config: &PackConfig) -> Result<()> {
    let start = Instant::now();

    let mut single = Accumulator::from_config(config)?;
    cottage(&mut single)?;
    let cottage = single.pack([("name".to_string(), "cottage".to_string())])?;

    // Four copies turned to face a shared square.
    let mut village = Accumulator::from_config(config)?;
    village.fill(IVec3::new(-12, -1, -12), IVec3::new(12, -1, 12), "grass_block")?;
    for turn in 0..4 {
        let offset = Transform::rotate_y(turn, IVec3::ZERO).apply(IVec3::new(-3, 0, -12))?;
        village.absorb(&cottage, &Transform::rotate_y(turn, offset))?;
    }
    village.comments_mut().insert("name".to_string(), "village".to_string());
    let snapshot = village.pack([("generator".to_string(), "blockpack demo".to_string())])?;
    codec::write_archive(out, &snapshot)?;

    let sand_last = |t: &str| if t == "sand" { Layer::Unstable } else { Layer::Stable };
    let mut ordered: Vec<BlockCommand> = Vec::new();
    snapshot.replay_layered(&Transform::IDENTITY, &sand_last, &mut ordered)?;

    println!("=== Blockpack demo ===");
    println!("Output:  {}", out.display());
    println!("Blocks:  {}", village.blocks().count());
    println!("Replay:  {} commands, sand placed last", ordered.len());
    print_summary(&snapshot);
    println!("Done in {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn print_usage() {
    println!("Usage: blockpack <info|export|import|demo> ...");
    println!("  info <FILE> [--commands]");
    println!("  export <FILE>");
    println!("  import <TEXT_FILE> <OUT>");
    println!("  demo <OUT> [--config <PATH>]");
}

/// Arguments that are neither flags nor flag values, program name skipped
fn positional_args(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            iter.next();
        } else if !arg.starts_with("--") {
            out.push(arg.as_str());
        }
    }
    out
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
