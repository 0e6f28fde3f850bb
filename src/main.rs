use anyhow::{Context, Result, bail};
use clap::Parser;
use cut_sheet_optimizer::config::{DEFAULT_KERF, OUTPUT_STEM, OptimizerConfig};
use cut_sheet_optimizer::loader::load_demand;
use cut_sheet_optimizer::optimizer::Optimizer;
use cut_sheet_optimizer::stock::StockLengthTable;
use cut_sheet_optimizer::{logging, render, writer};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

#[derive(Parser)]
#[command(
    name = "cut_sheet_optimizer",
    about = "Rod/bar cut sheet optimizer"
)]
struct Cli {
    /// Workbook (.xlsx/.xlsm), CSV file, or a folder holding them
    source: PathBuf,

    /// Saw blade kerf in inches
    #[arg(long, default_value_t = DEFAULT_KERF)]
    kerf: f64,

    /// JSON stock catalog replacing the built-in stick lengths
    #[arg(long)]
    stock_table: Option<PathBuf>,

    /// Directory for the cut sheet (default: next to the source)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Show an ASCII layout of each stick
    #[arg(long)]
    layout: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Workbooks and CSVs, excluding cut sheets written by earlier runs.
fn is_demand_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    matches!(ext.as_str(), "xlsx" | "xlsm" | "csv") && !stem.starts_with(OUTPUT_STEM)
}

/// Most recently modified workbook or CSV in `folder`.
fn find_latest_source(folder: &Path) -> Result<PathBuf> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() || !is_demand_file(&path) {
            continue;
        }
        let modified = path.metadata()?.modified()?;
        if latest.as_ref().is_none_or(|(t, _)| modified > *t) {
            latest = Some((modified, path));
        }
    }
    match latest {
        Some((_, path)) => Ok(path),
        None => bail!("no workbook or CSV found in {}", folder.display()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let source = if cli.source.is_dir() {
        find_latest_source(&cli.source)?
    } else {
        cli.source.clone()
    };
    tracing::info!(source = %source.display(), "using demand source");

    let stock = match &cli.stock_table {
        Some(path) => StockLengthTable::from_json_file(path)
            .with_context(|| format!("failed to read stock table {}", path.display()))?,
        None => StockLengthTable::standard(),
    };
    tracing::debug!(entries = stock.len(), "stock table ready");
    let config = OptimizerConfig::with_kerf(cli.kerf)?;

    let started = Instant::now();
    let demand =
        load_demand(&source).with_context(|| format!("failed to load {}", source.display()))?;
    tracing::info!(records = demand.len(), "demand loaded");

    let sheet = Optimizer::new(&stock, config).optimize_all(&demand)?;

    for skipped in &sheet.skipped {
        println!(
            "Skipped {} {} Ø{}: {}",
            skipped.group_tab, skipped.material, skipped.diameter, skipped.reason
        );
    }

    if cli.layout {
        for row in &sheet.rows {
            println!("{}  [{}]", row.stick_id, row.pattern_text());
            print!("{}", render::render_stick(row.stock_length, &row.cuts, config.kerf));
        }
        println!();
    }

    let out_dir = match &cli.out_dir {
        Some(dir) => dir.clone(),
        None => source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let out_path = writer::write_to_dir(&sheet.rows, &out_dir)
        .with_context(|| format!("failed to write cut sheet to {}", out_dir.display()))?;

    println!(
        "Summary: {} stick{} used, {} pieces, {:.4} in total drop ({:.1}% waste)",
        sheet.stick_count(),
        if sheet.stick_count() == 1 { "" } else { "s" },
        sheet.piece_count(),
        sheet.total_drop(),
        sheet.waste_percent(),
    );
    println!("Elapsed: {:?}", started.elapsed());
    println!("Output: {}", out_path.display());
    Ok(())
}
