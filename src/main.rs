// src/main.rs
use clap::{ArgAction, Parser};
use log::{error, info, LevelFilter};
use sro_featurize::model::{NeighborTopology, RadiusTable, Snapshot};
use sro_featurize::utils::logger;
use sro_featurize::{Result, SroConfig, SroError};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

/// Compute short-range-order features for one snapshot
#[derive(Parser, Debug)]
#[command(name = "srofeat", version, about)]
struct Cli {
    /// Snapshot JSON: atoms, box bounds, periodicity
    #[arg(long)]
    snapshot: PathBuf,

    /// Neighbor topology JSON; repeat for a second provider
    #[arg(long, required = true)]
    topology: Vec<PathBuf>,

    /// Radius table JSON keyed by atomic number; required when
    /// volume_area_interstice is among the configured features
    #[arg(long)]
    radii: Option<PathBuf>,

    /// Config JSON (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV output path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if logger::init(level).is_err() {
        eprintln!("logger already initialised");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let cfg = match &cli.config {
        Some(path) => {
            let cfg = SroConfig::load(path)?;
            info!("Config loaded from {:?}", path);
            cfg
        }
        None => {
            let (cfg, message) = SroConfig::load_or_default();
            info!("{}", message);
            cfg.validate()?;
            cfg
        }
    };

    if cfg.needs_radii() && cli.radii.is_none() {
        return Err(SroError::InvalidConfig(
            "--radii is required when volume_area_interstice is enabled".to_string(),
        ));
    }

    let snapshot = Snapshot::load(&cli.snapshot)?;
    info!(
        "Loaded {} atoms from {:?}",
        snapshot.atoms.len(),
        cli.snapshot
    );

    let mut pipeline = cfg.pipeline().with_snapshot(snapshot);
    for path in &cli.topology {
        let topology = NeighborTopology::load(path)?;
        info!(
            "Loaded {} topology ({} rows) from {:?}",
            topology.provider,
            topology.len(),
            path
        );
        pipeline = pipeline.with_topology(topology);
    }
    if let Some(path) = &cli.radii {
        let radii = RadiusTable::load(path)?;
        info!("Loaded radii for {} atom types", radii.len());
        pipeline = pipeline.with_radii(radii);
    }

    let featurizers = cfg.build_featurizers();
    let table = pipeline.run(&featurizers)?;
    info!(
        "Computed {} features for {} atoms",
        table.n_columns(),
        table.n_rows()
    );

    match &cli.output {
        Some(path) => {
            table.write_csv(BufWriter::new(File::create(path)?))?;
            info!("Features written to {:?}", path);
        }
        None => table.write_csv(io::stdout().lock())?,
    }
    Ok(())
}
