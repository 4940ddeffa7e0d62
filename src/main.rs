use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use oncordia::config::{self, EngineConfig};
use oncordia::db;
use oncordia::engine::{cohort, RuleEngine, RuleSet};

#[derive(Parser)]
#[command(
    name = "oncordia",
    version,
    about = "Run clinical-rule analyses over an oncology fact-store snapshot"
)]
struct Cli {
    /// Path to the read-only SQLite fact-store snapshot
    #[arg(long, default_value = "oncology_data.db")]
    db: PathBuf,

    /// Rule table JSON; built-in oncology defaults when omitted
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Which analysis to run
    #[arg(long, value_enum, default_value_t = Analysis::All)]
    analysis: Analysis,

    /// Cap the records printed per report; no effect on file output
    #[arg(short, long)]
    limit: Option<usize>,

    /// Write one JSON file per analysis into this directory instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Analysis {
    Regimen,
    Concordance,
    Recurrence,
    All,
}

impl Analysis {
    fn includes(self, other: Analysis) -> bool {
        self == Analysis::All || self == other
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    // Rule problems are fatal before any patient data is touched.
    let rules = match &cli.rules {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::default_oncology(),
    };
    let engine = RuleEngine::new(rules, EngineConfig::default())?;

    let conn = db::open_snapshot(&cli.db)?;
    let diagnoses = db::all_diagnoses(&conn)?;
    let stagings = db::all_stagings(&conn)?;

    if let Some(out) = &cli.out {
        fs::create_dir_all(out)?;
    }

    if cli.analysis.includes(Analysis::Regimen) {
        let ids = cohort::select_cohort(&diagnoses, &stagings, &engine.rules().regimen.cohort);
        let allowlist = engine.rules().regimen.signature.allowlist();
        let filter = db::SnapshotFilter {
            drug_allowlist: Some(&allowlist),
            lab_test_name: None,
        };
        let snapshot = db::fetch_snapshot(&conn, &ids, filter)?;
        let mut report = engine.run_regimen(&snapshot);
        if cli.out.is_none() {
            if let Some(limit) = cli.limit {
                report.cycles.truncate(limit);
            }
        }
        emit("regimen", &report, &cli.out)?;
    }

    if cli.analysis.includes(Analysis::Concordance) {
        let ids = cohort::select_cohort(&diagnoses, &stagings, &engine.rules().concordance.cohort);
        let snapshot = db::fetch_snapshot(&conn, &ids, db::SnapshotFilter::default())?;
        let mut report = engine.run_concordance(&snapshot);
        if cli.out.is_none() {
            if let Some(limit) = cli.limit {
                report.records.truncate(limit);
            }
        }
        emit("concordance", &report, &cli.out)?;
    }

    if cli.analysis.includes(Analysis::Recurrence) {
        let ids = cohort::select_cohort(&diagnoses, &stagings, &engine.rules().recurrence.cohort);
        let filter = db::SnapshotFilter {
            drug_allowlist: None,
            lab_test_name: Some(engine.rules().recurrence.test_name.as_str()),
        };
        let snapshot = db::fetch_snapshot(&conn, &ids, filter)?;
        let mut report = engine.run_recurrence(&snapshot);
        if cli.out.is_none() {
            if let Some(limit) = cli.limit {
                report.records.truncate(limit);
            }
        }
        emit("recurrence", &report, &cli.out)?;
    }

    Ok(())
}

fn emit<T: Serialize>(name: &str, report: &T, out: &Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    match out {
        Some(dir) => {
            let path = dir.join(format!("{name}.json"));
            fs::write(&path, json)?;
            tracing::info!(report = name, path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
