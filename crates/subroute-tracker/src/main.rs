use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use subroute_core::{daily_summaries, export_csv, Coordinate, TrackerConfig};
use subroute_tracker::simulator::{run_replay, ReplayReport, TripReplay};
use subroute_tracker::store::read_trip_logs;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let radius = || {
        Arg::new("radius")
            .long("radius")
            .value_parser(value_parser!(f64))
            .help("Arrival radius in km (overrides config)")
    };
    let json = || {
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Output the full report as JSON")
    };

    let cli = Command::new("subroute-sim")
        .version(subroute_tracker::VERSION)
        .about("SubRoute trip replay and logbook tools")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Tracker config TOML file"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("replay")
                .about("Replay recorded position events against a destination")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Replay JSON file"),
                )
                .arg(radius())
                .arg(json()),
        )
        .subcommand(
            Command::new("straight-line")
                .about("Drive a straight line from the Brisbane CBD test origin to its destination")
                .arg(
                    Arg::new("steps")
                        .long("steps")
                        .default_value("10")
                        .value_parser(value_parser!(usize))
                        .help("Number of interpolation steps"),
                )
                .arg(radius())
                .arg(json()),
        )
        .subcommand(
            Command::new("export")
                .about("Export JSON-lines trip logs as logbook CSV")
                .arg(
                    Arg::new("logs")
                        .long("logs")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Trip log .jsonl file"),
                )
                .arg(
                    Arg::new("odometer")
                        .long("odometer")
                        .value_parser(value_parser!(f64))
                        .help("Starting odometer in km (overrides config)"),
                )
                .arg(
                    Arg::new("summary")
                        .long("summary")
                        .action(ArgAction::SetTrue)
                        .help("Print daily summaries instead of CSV"),
                ),
        );

    let matches = cli.get_matches();
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    match matches.subcommand() {
        Some(("replay", args)) => {
            let path = args
                .get_one::<PathBuf>("file")
                .context("--file is required")?;
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading replay {}", path.display()))?;
            let replay: TripReplay = serde_json::from_str(&text)
                .with_context(|| format!("parsing replay {}", path.display()))?;
            apply_radius(&mut config, args)?;
            let report = run_replay(config, replay).await?;
            print_report(&report, args.get_flag("json"))?;
        }
        Some(("straight-line", args)) => {
            let steps = args.get_one::<usize>("steps").copied().unwrap_or(10);
            apply_radius(&mut config, args)?;
            let replay = TripReplay::straight_line(
                Coordinate::new(-27.4698, 153.0251),
                Coordinate::new(-27.4705, 153.0260),
                steps,
            );
            let report = run_replay(config, replay).await?;
            print_report(&report, args.get_flag("json"))?;
        }
        Some(("export", args)) => {
            let path = args
                .get_one::<PathBuf>("logs")
                .context("--logs is required")?;
            let logs = read_trip_logs(path)
                .await
                .with_context(|| format!("reading trip logs {}", path.display()))?;
            if args.get_flag("summary") {
                println!("{}", serde_json::to_string_pretty(&daily_summaries(&logs))?);
            } else {
                let odometer = args
                    .get_one::<f64>("odometer")
                    .copied()
                    .unwrap_or(config.starting_odometer_km);
                subroute_core::validation::validate_odometer(odometer)?;
                print!("{}", export_csv(&logs, odometer));
            }
        }
        _ => anyhow::bail!("unknown command, see --help"),
    }
    Ok(())
}

fn apply_radius(config: &mut TrackerConfig, args: &ArgMatches) -> anyhow::Result<()> {
    if let Some(radius) = args.get_one::<f64>("radius") {
        *config = config.clone().with_arrival_radius_km(*radius);
        config.validate()?;
    }
    Ok(())
}

fn print_report(report: &ReplayReport, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Replay Report:");
    match report.arrived_at_event {
        Some(idx) => println!("  Arrived at event: {idx}"),
        None => println!("  Arrived at event: never"),
    }
    println!("  Position errors: {}", report.position_errors);
    if report.events_dropped > 0 {
        println!("  Events dropped: {}", report.events_dropped);
    }
    if let Some(total) = report.distance_km.last() {
        println!("  Distance tracked: {total:.3} km");
    }
    match &report.log {
        Some(log) => {
            println!("  Logged: {} {}-{}", log.date, log.start_time, log.end_time);
            println!("    {} -> {}", log.origin, log.destination);
            println!(
                "    {:.1} km, {} min, {}",
                log.distance_km, log.duration_minutes, log.vehicle_label
            );
        }
        None => println!("  Logged: no"),
    }
    Ok(())
}
