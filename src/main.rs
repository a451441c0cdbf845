use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::Parser;

mod batch;
mod config;
mod paper;
mod printable;
mod util_3d;
mod vector_export;
mod waveobj;

use batch::{Job, OutputFormat};
use config::Config;
use paper::{FoldPreference, PaperOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Unfolds a 3D model into printable pages of paper
struct Cli {
    /// Model to unfold, in Wavefront OBJ format
    #[arg(short, long, value_name = "OBJ_FILE", conflicts_with = "input_dir", required_unless_present = "input_dir")]
    input: Option<PathBuf>,

    /// Output file, the extension of the format by default
    #[arg(short, long, value_name = "FILE", conflicts_with = "input_dir")]
    output: Option<PathBuf>,

    /// Unfolds every .obj file in this directory
    #[arg(long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = "output")]
    output_dir: PathBuf,

    #[arg(short, long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Options file, instead of the one in the user preferences
    #[arg(short, long, value_name = "JSON_FILE")]
    config: Option<PathBuf>,

    /// Page size in mm, as WxH, or a paper name such as A4 or Letter
    #[arg(long, value_name = "WxH", value_parser = parse_page_size)]
    page_size: Option<(f32, f32)>,

    #[arg(long, value_name = "MM")]
    margin: Option<f32>,

    #[arg(long, value_name = "MM")]
    flap_width: Option<f32>,

    #[arg(long, value_name = "DEG")]
    flap_angle: Option<f32>,

    /// How many folds can be cut to remove overlaps before giving up
    #[arg(long, value_name = "N")]
    max_iterations: Option<u32>,

    #[arg(long, value_enum)]
    fold_preference: Option<FoldPreference>,

    /// Millimetres of paper per model unit
    #[arg(short, long, conflicts_with = "auto_scale")]
    scale: Option<f32>,

    /// Scale the model to half the size of the page
    #[arg(long)]
    auto_scale: bool,

    /// Stores the resulting options as the user defaults
    #[arg(long)]
    save_config: bool,

    /// More logging, can be repeated
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// Sizes in mm
const PAPER_SIZES: &[(&str, (f32, f32))] = &[
    ("a5", (148.0, 210.0)),
    ("a4", (210.0, 297.0)),
    ("a3", (297.0, 420.0)),
    ("letter", (215.9, 279.4)),
    ("legal", (215.9, 355.6)),
];

fn parse_page_size(s: &str) -> Result<(f32, f32)> {
    let lower = s.to_ascii_lowercase();
    if let Some((_, size)) = PAPER_SIZES.iter().find(|(name, _)| *name == lower) {
        return Ok(*size);
    }
    let (w, h) = lower.split_once('x').ok_or_else(|| anyhow!("expected WxH, got '{s}'"))?;
    let w: f32 = w.trim().parse()?;
    let h: f32 = h.trim().parse()?;
    if !(w > 0.0 && h > 0.0) {
        return Err(anyhow!("page size must be positive"));
    }
    Ok((w, h))
}

impl Cli {
    // The config file, then every option given explicitly
    fn paper_options(&self) -> Result<PaperOptions> {
        let config = match &self.config {
            Some(file) => Config::load_from(file)?,
            None => Config::load_or_default(),
        };
        let mut options = config.options;
        if let Some(page_size) = self.page_size {
            options.page_size = page_size;
        }
        if let Some(margin) = self.margin {
            options.margin = margin;
        }
        if let Some(flap_width) = self.flap_width {
            options.flap_width = flap_width;
        }
        if let Some(flap_angle) = self.flap_angle {
            options.flap_angle = flap_angle;
        }
        if let Some(max_iterations) = self.max_iterations {
            options.max_iterations = max_iterations;
        }
        if let Some(fold_preference) = self.fold_preference {
            options.fold_preference = fold_preference;
            // An explicit preference replaces the weights of the config file
            options.fold_weights = None;
        }
        if let Some(scale) = self.scale {
            options.scale = scale;
        }
        options.validate()?;
        Ok(options)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<bool> {
    let job = Job {
        options: cli.paper_options()?,
        auto_scale: cli.auto_scale,
        format: cli.format,
    };
    log::debug!("{:?}", job);
    if cli.save_config {
        let config = Config { options: job.options.clone() };
        config.save()?;
        log::info!("options saved to {}", Config::file_name()?.display());
    }

    if let Some(input_dir) = &cli.input_dir {
        let report = batch::run_batch(input_dir, &cli.output_dir, &job)?;
        report.print_summary();
        return Ok(report.failed() == 0);
    }

    let input = cli.input.as_ref().ok_or_else(|| anyhow!("no input file"))?;
    let output = cli.output.clone().unwrap_or_else(|| input.with_extension(job.format.extension()));
    let report = batch::process_file(input, &output, &job);
    for w in &report.warnings {
        println!("warning: {w}");
    }
    match &report.error {
        None => {
            for f in &report.outputs {
                println!("{}", f.display());
            }
            Ok(true)
        }
        Some(e) => {
            eprintln!("error: {e}");
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_sizes() {
        assert_eq!(parse_page_size("A4").unwrap(), (210.0, 297.0));
        assert_eq!(parse_page_size("100x150.5").unwrap(), (100.0, 150.5));
        assert!(parse_page_size("100").is_err());
        assert!(parse_page_size("0x100").is_err());
    }

    #[test]
    fn flags_override_the_config() {
        let dir = std::env::temp_dir().join(format!("papermodel-cli-{}", std::process::id()));
        let file = dir.join("config.json");
        let mut cfg = Config::default();
        cfg.options.margin = 20.0;
        cfg.options.flap_width = 9.0;
        cfg.save_to(&file).unwrap();

        let cli = Cli::try_parse_from([
            "papermodel", "-i", "m.obj", "--config", file.to_str().unwrap(),
            "--flap-width", "4", "--fold-preference", "large-islands", "--page-size", "100x200",
        ]).unwrap();
        let opts = cli.paper_options().unwrap();
        assert_eq!(opts.margin, 20.0);
        assert_eq!(opts.flap_width, 4.0);
        assert_eq!(opts.page_size, (100.0, 200.0));
        assert_eq!(opts.fold_preference, FoldPreference::LargeIslands);

        // Bad values are caught before any model is read, from the config or the flags
        let cli = Cli::try_parse_from(["papermodel", "-i", "m.obj", "--config", file.to_str().unwrap(), "--flap-angle", "0"]).unwrap();
        let err = cli.paper_options().unwrap_err();
        assert!(err.to_string().contains("flap_angle"), "{err}");
        cfg.options.scale = 0.0;
        cfg.save_to(&file).unwrap();
        let cli = Cli::try_parse_from(["papermodel", "-i", "m.obj", "--config", file.to_str().unwrap()]).unwrap();
        assert!(cli.paper_options().is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cli_shape() {
        assert!(Cli::try_parse_from(["papermodel"]).is_err());
        assert!(Cli::try_parse_from(["papermodel", "-i", "a.obj", "--input-dir", "d"]).is_err());
        assert!(Cli::try_parse_from(["papermodel", "-i", "a.obj", "--scale", "2", "--auto-scale"]).is_err());
        let cli = Cli::try_parse_from(["papermodel", "--input-dir", "d", "-f", "pdf", "-vv"]).unwrap();
        assert_eq!(cli.output_dir, PathBuf::from("output"));
        assert_eq!(cli.format, OutputFormat::Pdf);
        assert_eq!(cli.verbose, 2);
    }
}
