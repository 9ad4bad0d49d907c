//! Park reservation controller.
//!
//! A standalone binary that runs one simulated park day over a named pipe.

#![cfg(unix)]

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use parksim::channel::fifo::{create_fifo, remove_fifo, FifoConnector, FifoIntake};
use parksim::channel::intake_queue;
use parksim::config::{SimulationConfig, HOUR_MAX, HOUR_MIN};
use parksim::ControllerRuntime;

/// Pending intake events the reader thread may buffer ahead of the loop.
const INTAKE_CAPACITY: usize = 256;

/// Controller configuration.
struct Config {
    /// Simulated day and park limits.
    simulation: SimulationConfig,
    /// FIFO the agents write to.
    pipe: PathBuf,
    /// Emit the final report as JSON instead of text.
    report_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig {
                open_hour: HOUR_MIN,
                close_hour: HOUR_MAX,
                capacity: 50,
                tick: Duration::from_secs(2),
            },
            pipe: PathBuf::from("./parksim.fifo"),
            report_json: false,
        }
    }
}

fn require_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    args.get(i + 1).map_or_else(
        || {
            eprintln!("error: {flag} requires a value");
            process::exit(1);
        },
        String::as_str,
    )
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("error: invalid value for {flag}: {value}");
        process::exit(1);
    })
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--open" => {
                config.simulation.open_hour = parse_number(require_value(&args, i, "--open"), "--open");
                i += 2;
            }
            "--close" => {
                config.simulation.close_hour =
                    parse_number(require_value(&args, i, "--close"), "--close");
                i += 2;
            }
            "--capacity" | "-c" => {
                config.simulation.capacity =
                    parse_number(require_value(&args, i, "--capacity"), "--capacity");
                i += 2;
            }
            "--tick-seconds" | "-t" => {
                let seconds: u64 =
                    parse_number(require_value(&args, i, "--tick-seconds"), "--tick-seconds");
                config.simulation.tick = Duration::from_secs(seconds);
                i += 2;
            }
            "--pipe" | "-p" => {
                config.pipe = PathBuf::from(require_value(&args, i, "--pipe"));
                i += 2;
            }
            "--report-json" => {
                config.report_json = true;
                i += 1;
            }
            "--help" | "-h" => {
                println!("parksim-controller - park reservation controller");
                println!();
                println!("USAGE:");
                println!("    parksim-controller [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("        --open <HOUR>           Opening hour [default: 7]");
                println!("        --close <HOUR>          Closing hour [default: 19]");
                println!("    -c, --capacity <PEOPLE>     Park capacity per hour [default: 50]");
                println!("    -t, --tick-seconds <SECS>   Real seconds per simulated hour [default: 2]");
                println!("    -p, --pipe <PATH>           Inbound FIFO path [default: ./parksim.fifo]");
                println!("        --report-json           Print the final report as JSON");
                println!("    -h, --help                  Print help information");
                process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                process::exit(1);
            }
        }
    }

    config
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = parse_args();
    config.simulation.validate()?;

    println!("parksim-controller v{}", env!("CARGO_PKG_VERSION"));
    println!("Listening on pipe: {}", config.pipe.display());
    println!(
        "Day {}:00-{}:00, capacity {}, {}s per hour",
        config.simulation.open_hour,
        config.simulation.close_hour,
        config.simulation.capacity,
        config.simulation.tick.as_secs()
    );

    create_fifo(&config.pipe)?;

    let (intake_tx, intake_rx) = intake_queue(INTAKE_CAPACITY);
    let reader = FifoIntake::spawn(&config.pipe, intake_tx)?;

    let runtime = ControllerRuntime::start(
        config.simulation,
        Box::new(FifoConnector),
        intake_rx,
        Box::new(move || {
            reader.unblock();
            reader.join();
        }),
    )?;

    let report = runtime.join()?;
    if config.report_json {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }

    remove_fifo(&config.pipe)?;
    Ok(())
}
