//! Park reservation agent.
//!
//! Reads a CSV of reservation requests and submits them to a running
//! controller over its inbound pipe.

#![cfg(unix)]

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use parksim::agent::AgentOptions;

fn require_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    args.get(i + 1).map_or_else(
        || {
            eprintln!("error: {flag} requires a value");
            process::exit(1);
        },
        String::as_str,
    )
}

fn parse_args() -> AgentOptions {
    let args: Vec<String> = std::env::args().collect();
    let mut name = None;
    let mut requests = None;
    let mut options = AgentOptions {
        name: String::new(),
        requests: PathBuf::new(),
        controller_pipe: PathBuf::from("./parksim.fifo"),
        delay: Duration::from_secs(2),
        close_when_done: false,
        end_wait: Duration::from_secs(60),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--name" | "-n" => {
                name = Some(require_value(&args, i, "--name").to_string());
                i += 2;
            }
            "--requests" | "-r" => {
                requests = Some(PathBuf::from(require_value(&args, i, "--requests")));
                i += 2;
            }
            "--pipe" | "-p" => {
                options.controller_pipe = PathBuf::from(require_value(&args, i, "--pipe"));
                i += 2;
            }
            "--delay-ms" => {
                let millis: u64 = require_value(&args, i, "--delay-ms")
                    .parse()
                    .unwrap_or_else(|_| {
                        eprintln!("error: invalid value for --delay-ms: {}", args[i + 1]);
                        process::exit(1);
                    });
                options.delay = Duration::from_millis(millis);
                i += 2;
            }
            "--close-when-done" => {
                options.close_when_done = true;
                i += 1;
            }
            "--end-wait-secs" => {
                let seconds: u64 = require_value(&args, i, "--end-wait-secs")
                    .parse()
                    .unwrap_or_else(|_| {
                        eprintln!("error: invalid value for --end-wait-secs: {}", args[i + 1]);
                        process::exit(1);
                    });
                options.end_wait = Duration::from_secs(seconds);
                i += 2;
            }
            "--help" | "-h" => {
                println!("parksim-agent - park reservation agent");
                println!();
                println!("USAGE:");
                println!("    parksim-agent --name <NAME> --requests <FILE> [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -n, --name <NAME>           Agent id (required)");
                println!("    -r, --requests <FILE>       CSV file of requests (required)");
                println!("    -p, --pipe <PATH>           Controller FIFO [default: ./parksim.fifo]");
                println!("        --delay-ms <MILLIS>     Pause between requests [default: 2000]");
                println!("        --close-when-done       Deregister after the last request");
                println!("        --end-wait-secs <SECS>  Give up on a silent controller [default: 60]");
                println!("    -h, --help                  Print help information");
                process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                process::exit(1);
            }
        }
    }

    options.name = name.unwrap_or_else(|| {
        eprintln!("error: --name is required");
        process::exit(1);
    });
    options.requests = requests.unwrap_or_else(|| {
        eprintln!("error: --requests is required");
        process::exit(1);
    });
    options
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = parse_args();
    println!(
        "parksim-agent v{} ({})",
        env!("CARGO_PKG_VERSION"),
        options.name
    );

    parksim::agent::run(&options)?;
    Ok(())
}
