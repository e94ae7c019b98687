use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use trackfix::{
    config::{DeviceProfile, EngineConfig},
    convert::{gpx_to_tcx, tcx_to_gpx},
    edit::{delete_points_in_window, shift_start_time},
    interpolation::transfer_sensor_data,
    load_document, load_gpx, load_tcx,
    models::{Document, Outcome, TcxDocument, TimeWindow},
    proximity::find_pois_near,
    recalc::recalculate,
    repair::fix_gpx_metadata,
    summary::summarize,
    sync::{InterpolateMode, sync_route},
    timezone::TzfZones,
    units::DistanceQuantity,
    writer::{session_csv, write_gpx, write_tcx},
};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

#[derive(Parser)]
#[command(
    name = "trackfix",
    version,
    about = "Statistics, repair and conversion for GPX and TCX activity files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON engine configuration, overriding TRACKFIX_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Device conventions for recalculated figures (polar or neutral)
    #[arg(long, global = true)]
    device: Option<String>,

    /// Output path; standard output when omitted
    #[arg(long, short = 'o', global = true)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    MatchLatLon,
    UseInterval,
}

impl From<Mode> for InterpolateMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::MatchLatLon => InterpolateMode::MatchLatLon,
            Mode::UseInterval => InterpolateMode::UseInterval,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the activity summary of a GPX or TCX file
    Info {
        file: PathBuf,

        /// Print JSON instead of the text report
        #[arg(long)]
        json: bool,
    },

    /// Copy heart rate and cadence from a TCX recording onto a GPX track
    SyncHr {
        #[arg(long)]
        gpx: PathBuf,
        #[arg(long)]
        tcx: PathBuf,
    },

    /// Replace TCX positions with positions interpolated along a route
    SyncRoute {
        #[arg(long)]
        tcx: PathBuf,
        #[arg(long)]
        route: PathBuf,
        #[arg(long, value_parser = parse_time)]
        start: Option<OffsetDateTime>,
        #[arg(long, value_parser = parse_time)]
        end: Option<OffsetDateTime>,
        #[arg(long, value_enum, default_value = "match-lat-lon")]
        mode: Mode,
    },

    /// Recompute lap and activity figures of a TCX file
    Recalc { tcx: PathBuf },

    /// Delete TCX trackpoints inside a time window
    Delete {
        tcx: PathBuf,
        #[arg(long, value_parser = parse_time)]
        start: Option<OffsetDateTime>,
        #[arg(long, value_parser = parse_time)]
        end: Option<OffsetDateTime>,
    },

    /// Move all TCX trackpoint times so the activity starts at a new time
    Shift {
        tcx: PathBuf,
        #[arg(long, value_parser = parse_time)]
        start: OffsetDateTime,
    },

    /// Write the POIs lying within a distance of a GPX file's tracks and routes
    FindPoi {
        #[arg(long)]
        route: PathBuf,
        #[arg(long)]
        pois: PathBuf,
        /// Search radius, e.g. "0.5 mi" or "200 m"
        #[arg(long)]
        distance: String,
    },

    /// Convert GPX to TCX or TCX to GPX
    Convert { file: PathBuf },

    /// Write a time,hr CSV session from a TCX file
    Session { tcx: PathBuf },

    /// Fill missing category and location from the file name and move
    /// offset-less trackpoint times to UTC
    FixGpx { file: PathBuf },
}

fn parse_time(s: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| format!("expected an RFC 3339 time: {e}"))
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => EngineConfig::from_env()?,
    };
    if let Some(name) = &cli.device {
        config = config.with_device(DeviceProfile::by_name(name)?);
    }
    Ok(config)
}

fn emit(output: Option<&Path>, bytes: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "Wrote output");
        }
        None => print!("{}", String::from_utf8_lossy(bytes)),
    }
    Ok(())
}

/// Prints the report and tells whether the operation ran to completion.
fn report<T: Display>(outcome: Outcome<T>) -> bool {
    match outcome {
        Outcome::Completed(report) => {
            info!("{report}");
            eprintln!("{report}");
            true
        }
        Outcome::Aborted => {
            eprintln!("Aborted");
            false
        }
    }
}

/// The requested window, with missing ends taken from the activity itself.
fn window_for(
    tcx: &TcxDocument,
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
) -> Option<TimeWindow> {
    let mut times = tcx.points().filter_map(|p| p.time);
    let first = times.next();
    let last = times.last().or(first);
    Some(TimeWindow::new(start.or(first)?, end.or(last)?))
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let output = cli.output.as_deref();

    match &cli.command {
        Command::Info { file, json } => {
            let document = load_document(file)?;
            let summary = summarize(&document, Some(file.as_path()), &config, &TzfZones::new())?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
        }
        Command::SyncHr { gpx, tcx } => {
            let mut gpx_doc = load_gpx(gpx)?;
            let tcx_doc = load_tcx(tcx)?;
            let transfer = transfer_sensor_data(&mut gpx_doc, &tcx_doc)?;
            eprintln!("{transfer}");
            gpx_doc.creator = Some(trackfix::CREATOR.to_string());
            emit(output, &write_gpx(&gpx_doc)?)?;
        }
        Command::SyncRoute {
            tcx,
            route,
            start,
            end,
            mode,
        } => {
            let mut tcx_doc = load_tcx(tcx)?;
            let route_doc = load_gpx(route)?;
            let window = window_for(&tcx_doc, *start, *end);
            let outcome = sync_route(
                &mut tcx_doc,
                &route_doc,
                window,
                (*mode).into(),
                &config.device,
            )?;
            if report(outcome) {
                emit(output, &write_tcx(&tcx_doc)?)?;
            }
        }
        Command::Recalc { tcx } => {
            let mut tcx_doc = load_tcx(tcx)?;
            recalculate(&mut tcx_doc, &config.device);
            emit(output, &write_tcx(&tcx_doc)?)?;
        }
        Command::Delete { tcx, start, end } => {
            let mut tcx_doc = load_tcx(tcx)?;
            let window = window_for(&tcx_doc, *start, *end);
            if report(delete_points_in_window(&mut tcx_doc, window, &config.device)?) {
                emit(output, &write_tcx(&tcx_doc)?)?;
            }
        }
        Command::Shift { tcx, start } => {
            let mut tcx_doc = load_tcx(tcx)?;
            if report(shift_start_time(&mut tcx_doc, Some(*start), &config.device)?) {
                emit(output, &write_tcx(&tcx_doc)?)?;
            }
        }
        Command::FindPoi {
            route,
            pois,
            distance,
        } => {
            let route_doc = load_gpx(route)?;
            let poi_doc = load_gpx(pois)?;
            let radius: DistanceQuantity = distance.parse()?;
            let outcome = find_pois_near(
                &route_doc,
                &poi_doc,
                Some(radius),
                config.poi_interp_distance_factor,
            )?;
            if let Outcome::Completed(result) = &outcome {
                emit(output, &write_gpx(&result.to_gpx(trackfix::CREATOR))?)?;
            }
            report(outcome);
        }
        Command::Convert { file } => match load_document(file)? {
            Document::Gpx(gpx) => emit(output, &write_tcx(&gpx_to_tcx(&gpx, &config.device))?)?,
            Document::Tcx(tcx) => emit(output, &write_gpx(&tcx_to_gpx(&tcx))?)?,
        },
        Command::Session { tcx } => {
            let tcx_doc = load_tcx(tcx)?;
            let csv = session_csv(&tcx_doc, &TzfZones::new())?;
            if csv.is_empty() {
                bail!("No trackpoints with heart rate, time and position");
            }
            emit(output, csv.as_bytes())?;
        }
        Command::FixGpx { file } => {
            let mut gpx = load_gpx(file)?;
            let name = file.file_name().and_then(|n| n.to_str());
            let fixed = fix_gpx_metadata(&mut gpx, name, &TzfZones::new());
            eprintln!("{fixed}");
            if fixed.is_modified() {
                emit(output, &write_gpx(&gpx)?)?;
            }
        }
    }
    Ok(())
}
