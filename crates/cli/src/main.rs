use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use mediadrift_core::config::Config;
use mediadrift_core::render::format_size;
use mediadrift_core::report::RunReport;
use mediadrift_core::{build_report, FirstRunPolicy, ObservedItem, ReportOptions};

#[derive(Parser, Debug)]
#[command(
    name = "mediadrift",
    version,
    about = "Media library change detection and report batching"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Report {
        /// JSON array of observed items handed over by the retrieval layer
        #[arg(long)]
        input: PathBuf,

        /// Snapshot file for this domain; overrides --domain
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Tracked domain; selects <snapshot_dir>/<domain>.json
        #[arg(long, default_value = "library-sizes")]
        domain: String,

        /// Base title for outbound batches
        #[arg(long)]
        title: Option<String>,

        /// Minimum size delta (GB) treated as a real change
        #[arg(long)]
        epsilon: Option<f64>,

        /// First-run behavior: summary | suppress
        #[arg(long)]
        first_run: Option<FirstRunPolicy>,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "mediadrift-out")]
        out: PathBuf,
    },
}

struct Style {
    bold: &'static str,
    dim: &'static str,
    red: &'static str,
    green: &'static str,
    yellow: &'static str,
    orange: &'static str,
    reset: &'static str,
}

const COLOR: Style = Style {
    bold: "\x1b[1m",
    dim: "\x1b[2m",
    red: "\x1b[31m",
    green: "\x1b[32m",
    yellow: "\x1b[33m",
    orange: "\x1b[38;5;208m",
    reset: "\x1b[0m",
};

const PLAIN: Style = Style {
    bold: "",
    dim: "",
    red: "",
    green: "",
    yellow: "",
    orange: "",
    reset: "",
};

fn style() -> &'static Style {
    if std::env::var_os("NO_COLOR").is_some() {
        &PLAIN
    } else {
        &COLOR
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> std::process::ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let res = match cli.cmd {
        Commands::Report {
            input,
            snapshot,
            domain,
            title,
            epsilon,
            first_run,
            config,
            out,
        } => run_report(
            &input, snapshot, &domain, title, epsilon, first_run, config, &out,
        ),
    };

    match res {
        Ok(code) => code,
        Err(e) => {
            let s = style();
            eprintln!(
                "{}{red}error:{reset} {:#}",
                s.bold,
                e,
                red = s.red,
                reset = s.reset
            );
            std::process::ExitCode::from(1)
        }
    }
}

fn print_banner() {
    let s = style();
    eprintln!(
        "\n  {bold}media{reset}{orange}|{reset}{dim}drift{reset}  {dim}library change reporter{reset}\n",
        bold = s.bold,
        orange = s.orange,
        dim = s.dim,
        reset = s.reset,
    );
}

fn delta_color(delta: f64) -> &'static str {
    let s = style();
    if delta > 0.0 {
        s.green
    } else if delta < 0.0 {
        s.red
    } else {
        s.dim
    }
}

fn machine_line(report: &RunReport) -> String {
    format!(
        "changes={} batches={} truncated={}",
        report.changes.len(),
        report.batches.len(),
        report.truncated
    )
}

fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(p) => Config::load(p).unwrap_or_else(|e| {
            eprintln!(
                "{}{}warning:{} failed to load config {}: {}",
                style().bold,
                style().yellow,
                style().reset,
                p.display(),
                e
            );
            Config::default()
        }),
        None => Config::discover().unwrap_or_default(),
    }
}

fn print_report(report: &RunReport, out: &Path) {
    let s = style();

    eprintln!(
        "  {dim}total size     {reset}{bold}{}{reset}",
        format_size(report.summary.total_value),
        dim = s.dim,
        bold = s.bold,
        reset = s.reset
    );
    if report.first_run {
        eprintln!(
            "  {dim}first run      {reset}{bold}yes{reset}",
            dim = s.dim,
            bold = s.bold,
            reset = s.reset
        );
    } else {
        let dc = delta_color(report.summary.value_delta_total);
        eprintln!(
            "  {dim}size change    {reset}{dc}{bold}{:+.2} GB{reset}",
            report.summary.value_delta_total,
            dim = s.dim,
            dc = dc,
            bold = s.bold,
            reset = s.reset
        );
    }
    eprintln!(
        "  {dim}changes        {reset}{bold}{}{reset}",
        report.changes.len(),
        dim = s.dim,
        bold = s.bold,
        reset = s.reset
    );
    eprintln!(
        "  {dim}batches        {reset}{bold}{}{reset}",
        report.batches.len(),
        dim = s.dim,
        bold = s.bold,
        reset = s.reset
    );

    if report.truncated {
        eprintln!(
            "  {yellow}{bold}TRUNCATED{reset}  {dim}report exceeded the batch cap; tail dropped{reset}",
            yellow = s.yellow,
            bold = s.bold,
            dim = s.dim,
            reset = s.reset
        );
    }
    if !report.snapshot_persisted {
        eprintln!(
            "  {yellow}{bold}SNAPSHOT NOT SAVED{reset}  {dim}next run will re-detect these changes{reset}",
            yellow = s.yellow,
            bold = s.bold,
            dim = s.dim,
            reset = s.reset
        );
    }

    eprintln!();
    eprintln!(
        "  {dim}\u{2192} {}{reset}",
        out.join("batches.json").display(),
        dim = s.dim,
        reset = s.reset
    );
    eprintln!(
        "  {dim}\u{2192} {}{reset}",
        out.join("report.md").display(),
        dim = s.dim,
        reset = s.reset
    );
    eprintln!();
}

#[allow(clippy::too_many_arguments)]
fn run_report(
    input: &Path,
    snapshot: Option<PathBuf>,
    domain: &str,
    title: Option<String>,
    epsilon: Option<f64>,
    first_run: Option<FirstRunPolicy>,
    config: Option<PathBuf>,
    out: &Path,
) -> anyhow::Result<std::process::ExitCode> {
    print_banner();

    let cfg = load_config(config.as_deref());

    let snapshot_dir = cfg
        .snapshot_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("mediadrift-data"));
    let snapshot_path = snapshot.unwrap_or_else(|| snapshot_dir.join(format!("{domain}.json")));

    let opts = ReportOptions {
        epsilon: epsilon
            .or(cfg.epsilon)
            .unwrap_or(mediadrift_core::DEFAULT_EPSILON),
        snapshot_path: Some(snapshot_path),
        first_run_policy: first_run.or(cfg.first_run_policy).unwrap_or_default(),
        count_label: cfg
            .count_label
            .clone()
            .unwrap_or_else(|| "episodes".to_string()),
        report_title: title.or(cfg.report_title.clone()),
    };

    let raw = fs::read_to_string(input)
        .with_context(|| format!("read observations {}", input.display()))?;
    let observed: Vec<ObservedItem> = serde_json::from_str(&raw)
        .with_context(|| format!("parse observations {}", input.display()))?;

    let report = build_report(&observed, &opts)?;

    fs::create_dir_all(out).with_context(|| format!("create out dir {}", out.display()))?;

    let batches_path = out.join("batches.json");
    let json = serde_json::to_vec_pretty(&report.batches).context("serialize batches")?;
    fs::write(&batches_path, json)
        .with_context(|| format!("write {}", batches_path.display()))?;

    let md_path = out.join("report.md");
    fs::write(&md_path, report.to_markdown())
        .with_context(|| format!("write {}", md_path.display()))?;

    // Machine-parseable line on stdout
    println!("{}", machine_line(&report));

    // Human-readable output on stderr
    print_report(&report, out);

    Ok(std::process::ExitCode::from(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediadrift_core::report::{ChangeCounts, RunSummary};
    use serial_test::serial;

    fn empty_report() -> RunReport {
        RunReport {
            first_run: false,
            truncated: false,
            snapshot_persisted: true,
            changes: vec![],
            batches: vec![],
            summary: RunSummary {
                libraries: vec![],
                total_value: 0.0,
                movie_count: 0,
                show_count: 0,
                episode_count: 0,
                change_counts: ChangeCounts::default(),
                value_delta_total: 0.0,
            },
        }
    }

    #[test]
    fn machine_line_is_stable() {
        assert_eq!(
            machine_line(&empty_report()),
            "changes=0 batches=0 truncated=false"
        );
    }

    #[test]
    #[serial]
    fn delta_color_signs() {
        std::env::remove_var("NO_COLOR");
        assert_eq!(delta_color(1.5), style().green);
        assert_eq!(delta_color(-1.5), style().red);
        assert_eq!(delta_color(0.0), style().dim);
    }

    #[test]
    #[serial]
    fn style_respects_no_color() {
        std::env::set_var("NO_COLOR", "1");
        assert_eq!(style().bold, "");
        std::env::remove_var("NO_COLOR");
        assert_ne!(style().bold, "");
    }
}
