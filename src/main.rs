//! DelftProto host CLI: install a bytecode script, drive it for a fixed
//! number of rounds, and print each round's thread results.

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use delftproto::host::{HostConfig, NullPlatform};
use delftproto::machine::Machine;
use delftproto::script::Script;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("delftproto-host v{VERSION}");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    delftproto-host [OPTIONS] <SCRIPT>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -c, --config <FILE>  Host config TOML (default: built-in)");
    eprintln!("    -r, --rounds <N>     Number of rounds to run (default: 1)");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <SCRIPT>             Path to an installed bytecode script (raw bytes)");
}

struct Options {
    script: Option<String>,
    config: Option<String>,
    rounds: u32,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut script = None;
    let mut config = None;
    let mut rounds = 1u32;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                config = Some(args.get(i).ok_or("missing file after -c")?.clone());
            }
            "-r" | "--rounds" => {
                i += 1;
                let raw = args.get(i).ok_or("missing count after -r")?;
                rounds = raw.parse().map_err(|_| format!("invalid round count: {raw}"))?;
            }
            arg if arg.starts_with('-') => return Err(format!("unknown option: {arg}")),
            arg => {
                if script.is_some() {
                    return Err("multiple script files specified".to_string());
                }
                script = Some(arg.to_string());
            }
        }
        i += 1;
    }
    Ok(Options { script, config, rounds })
}

fn load_config(path: Option<&str>) -> Result<HostConfig, String> {
    match path {
        None => Ok(HostConfig::default()),
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}"))?;
            HostConfig::from_toml(&text).map_err(|e| format!("parsing {path}: {e}"))
        }
    }
}

fn run(options: Options) -> Result<(), String> {
    let script_path = options.script.as_deref().ok_or("missing script file")?;
    let config = load_config(options.config.as_deref())?;

    let bytes = fs::read(Path::new(script_path)).map_err(|e| format!("reading {script_path}: {e}"))?;
    let platform = NullPlatform::default();
    let mut machine = Machine::with_max_call_depth(config.node_id, platform, config.initial_max_call_depth);
    machine.install(Script::new(bytes));
    while !machine.finished() {
        machine.step().map_err(|e| format!("install: {e}"))?;
    }

    for round in 0..options.rounds {
        machine.run(round as f64).map_err(|e| format!("round {round}: {e}"))?;
        while !machine.finished() {
            machine.step().map_err(|e| format!("round {round}: {e}"))?;
        }
        for (i, thread) in machine.threads().iter().enumerate() {
            println!("round {round} thread {i}: {}", thread.result);
        }
    }
    Ok(())
}

fn main() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };
    if let Err(e) = run(options) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
