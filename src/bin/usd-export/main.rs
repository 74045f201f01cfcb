//! usd-export CLI - export JSON scenes and inspect the resulting layers.

use std::env;
use std::fs;
use std::path::Path;

use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use usd_export::sdf::{extension, open_package, Layer, Stage};
use usd_export::{JobExportArgs, MemoryScene, SdfPath, WriteJob};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("USD_EXPORT_BUILD_DATE"),
    ")"
);

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        "e" | "export" => {
            if filtered_args.len() < 3 {
                eprintln!("Error: missing arguments");
                eprintln!("Usage: usd-export export <scene.json> <out> [--job job.json] [--append] [--frames a:b[:step]]");
                std::process::exit(1);
            }
            cmd_export(filtered_args[1], filtered_args[2], &filtered_args[3..]);
        }

        "t" | "tree" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing file argument");
                eprintln!("Usage: usd-export tree <layer>");
                std::process::exit(1);
            }
            cmd_tree(filtered_args[1]);
        }

        "h" | "help" | "-h" | "--help" => print_help(),

        "--version" | "version" => println!("usd-export {}", VERSION),

        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!("usd-export {} - scene export toolkit", VERSION);
    println!();
    println!("USAGE:");
    println!("    usd-export [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    e, export <scene.json> <out>  Export a JSON scene to a layer or package");
    println!("    t, tree   <layer>             Show the composed prim hierarchy");
    println!("    h, help                       Show this help");
    println!();
    println!("EXPORT OPTIONS:");
    println!("    --job <job.json>     Export arguments (JSON)");
    println!("    --append             Add to an existing layer");
    println!("    --frames a:b[:step]  Sample animation from a to b");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("EXAMPLES:");
    println!("    usd-export export scene.json out.usda                 # Text layer");
    println!("    usd-export export scene.json out.usdz --frames 1:24   # Animated package");
    println!("    usd-export export scene.json out --job arkit.json     # Extension from the job");
    println!("    usd-export tree out.usdz                              # Inspect the result");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides the verbosity flags");
    println!("    - Without an extension the output is .usd (.usdz for ARKit compatibility)");
}

/// Parse `a:b[:step]` into a frame list.
fn parse_frames(spec: &str) -> Option<Vec<f64>> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (start, end, step) = match parts.as_slice() {
        [a, b] => (a.parse().ok()?, b.parse().ok()?, 1.0),
        [a, b, s] => (a.parse().ok()?, b.parse().ok()?, s.parse().ok()?),
        _ => return None,
    };
    Some(JobExportArgs::frame_range(start, end, step))
}

fn cmd_export(scene_path: &str, out: &str, options: &[&str]) {
    let mut job_path: Option<&str> = None;
    let mut append = false;
    let mut frames: Option<Vec<f64>> = None;

    let mut it = options.iter();
    while let Some(opt) = it.next() {
        match *opt {
            "--job" => job_path = it.next().copied(),
            "--append" => append = true,
            "--frames" => {
                frames = it.next().and_then(|s| parse_frames(s));
                if frames.is_none() {
                    eprintln!("Error: --frames expects a:b[:step]");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("Unknown export option: {}", other);
                std::process::exit(1);
            }
        }
    }

    info!("Loading scene: {}", scene_path);
    let scene = match MemoryScene::load(scene_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load {}: {}", scene_path, e);
            std::process::exit(1);
        }
    };

    let mut args = match job_path {
        Some(path) => {
            let parsed = fs::read_to_string(path)
                .map_err(usd_export::Error::from)
                .and_then(|json| JobExportArgs::from_json(&json));
            match parsed {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("Failed to read job {}: {}", path, e);
                    std::process::exit(1);
                }
            }
        }
        None => JobExportArgs::default(),
    };
    if let Some(frames) = frames {
        args.time_samples = frames;
    }
    debug!("Export arguments: {:?}", args);

    let mut job = WriteJob::new(args, &scene);
    if let Err(e) = job.write(out, append) {
        eprintln!("Export failed: {}", e);
        std::process::exit(1);
    }

    let written = job.package_name().unwrap_or(job.file_name()).display().to_string();
    println!("Wrote {} ({} prims, {} frames)", written, job.dag_to_usd_path_map().len(), job.frames_written().len());
    if let Some(e) = job.package_error() {
        eprintln!("Packaging failed: {}", e);
        std::process::exit(2);
    }
}

fn cmd_tree(path: &str) {
    info!("Opening layer: {}", path);

    let is_package = Path::new(path).extension().and_then(|e| e.to_str()) == Some(extension::PACKAGE);
    let opened = if is_package {
        open_package(Path::new(path)).map(|(name, layer)| {
            println!("Package: {} (root layer {})", path, name);
            layer
        })
    } else {
        Layer::open(path).inspect(|_| println!("Layer: {}", path))
    };
    let layer = match opened {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to open {}: {}", path, e);
            std::process::exit(1);
        }
    };

    let meta = &layer.metadata;
    if let Some(prim) = &meta.default_prim {
        println!("Default prim: {}", prim);
    }
    if let Some(axis) = &meta.up_axis {
        println!("Up axis: {}", axis);
    }
    if let Some(mpu) = meta.meters_per_unit {
        println!("Meters per unit: {}", mpu);
    }
    if let (Some(start), Some(end)) = (meta.start_time_code, meta.end_time_code) {
        println!("Time codes: {} - {}", start, end);
    }
    println!();

    let stage = Stage::new(layer);
    for child in stage.children(&SdfPath::absolute_root()) {
        print_tree(&stage, &child, 0);
    }
}

fn print_tree(stage: &Stage, path: &SdfPath, depth: usize) {
    let Some(prim) = stage.prim(path) else {
        return;
    };
    let indent = "  ".repeat(depth);
    let type_name = if prim.type_name.is_empty() { "-" } else { &prim.type_name };
    let mut notes: Vec<String> = Vec::new();
    if let Some(kind) = prim.kind() {
        notes.push(format!("kind={}", kind));
    }
    if !prim.active {
        notes.push("inactive".to_string());
    }
    if prim.has_authored_references {
        notes.push("ref".to_string());
    }
    if notes.is_empty() {
        println!("{}{} [{}]", indent, prim.path.name(), type_name);
    } else {
        println!("{}{} [{}] ({})", indent, prim.path.name(), type_name, notes.join(", "));
    }
    for child in stage.children(path) {
        print_tree(stage, &child, depth + 1);
    }
}
