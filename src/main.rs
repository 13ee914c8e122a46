use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use notepad_extractor_lib::catalog::{self, ScanReport};
use notepad_extractor_lib::config::ExtractorConfig;
use notepad_extractor_lib::db::StateDatabase;
use notepad_extractor_lib::decoder;
use notepad_extractor_lib::export;
use notepad_extractor_lib::locator;
use notepad_extractor_lib::models::{ExportFormat, SortDirection, SortKey};

#[derive(Debug, Parser)]
#[command(name = "notepad-extractor")]
#[command(about = "Recover notepad content from Cursor workspace state databases")]
struct Cli {
    /// Workspace storage directory holding one subdirectory per workspace.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// JSON or YAML file overriding the built-in scan settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write JSON logs to a daily-rolling file in this directory instead of stderr.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Describe the workspace directory.
    Info,
    /// List every retained finding.
    Scan(ScanArgs),
    /// Summarize the findings of a scan.
    Stats,
    /// List individual notes.
    Notes(NotesArgs),
    /// Write notes to a file.
    Export(ExportArgs),
    /// Write the full findings report.
    Report(ReportArgs),
    /// Dump the structure of one database file.
    Debug(DebugArgs),
    /// List the rows of one table with a decoded preview of each value.
    Dump(DumpArgs),
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Title,
    Modified,
}

impl From<SortArg> for SortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Title => SortKey::Title,
            SortArg::Modified => SortKey::RecentlyModified,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Txt,
    Md,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Txt => ExportFormat::Text,
            FormatArg::Md => ExportFormat::Markdown,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

#[derive(Debug, Args)]
struct NotesArgs {
    #[arg(long)]
    search: Option<String>,
    #[arg(long, value_enum, default_value_t = SortArg::Title)]
    sort: SortArg,
    #[arg(long, default_value_t = false)]
    descending: bool,
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Output file, or a directory when exporting a single note by index.
    #[arg(long)]
    out: PathBuf,
    /// Defaults to the output file's extension.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    #[arg(long)]
    search: Option<String>,
    /// Export only the note at this 1-based position of the filtered, title-sorted list.
    #[arg(long)]
    index: Option<usize>,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DebugArgs {
    db_path: PathBuf,
}

#[derive(Debug, Args)]
struct DumpArgs {
    db_path: PathBuf,
    /// Defaults to the configured `defaultTable`.
    #[arg(long)]
    table: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    notepad_extractor_lib::init_tracing(cli.log_dir.as_deref()).map_err(|error| anyhow!(error))?;

    let config = match &cli.config {
        Some(path) => ExtractorConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ExtractorConfig::default(),
    }
    .with_overrides(cli.workspace.clone());

    match cli.command {
        Command::Info => run_info(&config),
        Command::Scan(args) => run_scan(&args, &config),
        Command::Stats => run_stats(&config),
        Command::Notes(args) => run_notes(&args, &config),
        Command::Export(args) => run_export(&args, &config),
        Command::Report(args) => run_report(&args, &config),
        Command::Debug(args) => run_debug(&args),
        Command::Dump(args) => run_dump(&args, &config),
    }
}

fn scan_reporting(config: &ExtractorConfig) -> ScanReport {
    let report = catalog::scan(config);
    if let Some(diagnostic) = &report.diagnostic {
        eprintln!("{}", diagnostic);
    }
    report
}

fn run_info(config: &ExtractorConfig) -> Result<()> {
    let root = config.workspace_path();
    let info = config.workspace_info(&root);
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn run_scan(args: &ScanArgs, config: &ExtractorConfig) -> Result<()> {
    let report = scan_reporting(config);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.findings)?);
        return Ok(());
    }
    for finding in &report.findings {
        let marker = if finding.is_notepad { "*" } else { " " };
        println!(
            "{} {}/{} {} ({} bytes)",
            marker, finding.database, finding.table, finding.key, finding.size
        );
    }
    println!("{} findings", report.findings.len());
    Ok(())
}

fn run_stats(config: &ExtractorConfig) -> Result<()> {
    let report = scan_reporting(config);
    println!("{}", serde_json::to_string_pretty(&locator::statistics(&report.findings))?);
    Ok(())
}

fn run_notes(args: &NotesArgs, config: &ExtractorConfig) -> Result<()> {
    let report = scan_reporting(config);
    let mut notes = catalog::filter_notes(&report.notes, args.search.as_deref().unwrap_or_default());
    let direction = if args.descending {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    catalog::sort_notes(&mut notes, args.sort.into(), direction);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }
    for (index, note) in notes.iter().enumerate() {
        println!(
            "{:>3}. {} [{}] {} bytes, modified {}",
            index + 1,
            note.title,
            note.database,
            note.size,
            note.modified.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn run_export(args: &ExportArgs, config: &ExtractorConfig) -> Result<()> {
    let report = scan_reporting(config);
    let search = args.search.as_deref().unwrap_or_default();
    let mut notes = catalog::filter_notes(&report.notes, search);
    catalog::sort_notes(&mut notes, SortKey::Title, SortDirection::Ascending);
    let format = args
        .format
        .map(ExportFormat::from)
        .unwrap_or_else(|| ExportFormat::from_path(&args.out));
    let now = Utc::now();

    let (path, contents) = match args.index {
        Some(index) => {
            let note = index
                .checked_sub(1)
                .and_then(|position| notes.get(position))
                .ok_or_else(|| anyhow!("no note at position {} ({} notes listed)", index, notes.len()))?;
            let path = if args.out.is_dir() {
                args.out.join(export::default_filename(note, format))
            } else {
                args.out.clone()
            };
            (path, export::render_note(format, note, now)?)
        }
        None => (args.out.clone(), export::render_notes(format, &notes, Some(search), now)?),
    };

    export::write_export(&path, &contents)?;
    println!("{}", path.display());
    Ok(())
}

fn run_report(args: &ReportArgs, config: &ExtractorConfig) -> Result<()> {
    let report = scan_reporting(config);
    let contents = export::render_findings_report(&report.findings, Utc::now());
    export::write_export(&args.out, &contents)?;
    println!("{}", args.out.display());
    Ok(())
}

fn run_debug(args: &DebugArgs) -> Result<()> {
    let db = StateDatabase::open(&args.db_path)?;
    println!("{}", db.debug_info());
    Ok(())
}

fn run_dump(args: &DumpArgs, config: &ExtractorConfig) -> Result<()> {
    let db = StateDatabase::open(&args.db_path)?;
    let table = config.table_or_default(args.table.as_deref());
    let rows = db.all_data(table, args.limit);
    for (key, value) in &rows {
        let analysis = decoder::analyze(value);
        println!(
            "{} ({} bytes{}): {}",
            key,
            analysis.size,
            if analysis.is_json { ", json" } else { "" },
            analysis.preview.as_deref().unwrap_or("<binary>")
        );
    }
    println!("{} rows in {}", rows.len(), table);
    Ok(())
}
