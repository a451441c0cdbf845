//! Runs the whole pipeline on files: read, unfold, export, write.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::paper::{PaperOptions, Papercraft, Warning};
use crate::printable::export_pages;
use crate::{vector_export, waveobj};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Svg,
    Pdf,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Json => "json",
        }
    }
}

/// What to do with every input file.
#[derive(Debug, Clone)]
pub struct Job {
    pub options: PaperOptions,
    pub auto_scale: bool,
    pub format: OutputFormat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    Failed,
}

/// The manifest entry of one input file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub status: FileStatus,
    pub outputs: Vec<PathBuf>,
    pub scale: f32,
    // Paper covered by the faces, in mm², flaps not included
    pub paper_area: f32,
    pub islands: usize,
    // Too big for a page, not in any output
    pub omitted_islands: usize,
    pub narrowest_flap: Option<f32>,
    pub pages: usize,
    pub warnings: Vec<Warning>,
    pub error: Option<String>,
}

impl FileReport {
    fn failed(input: &Path, scale: f32, error: String) -> FileReport {
        FileReport {
            input: input.to_owned(),
            status: FileStatus::Failed,
            outputs: Vec::new(),
            scale,
            paper_area: 0.0,
            islands: 0,
            omitted_islands: 0,
            narrowest_flap: None,
            pages: 0,
            warnings: Vec::new(),
            error: Some(error),
        }
    }
    pub fn is_ok(&self) -> bool {
        self.status == FileStatus::Ok
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn successful(&self) -> usize {
        self.files.iter().filter(|f| f.is_ok()).count()
    }
    pub fn failed(&self) -> usize {
        self.files.len() - self.successful()
    }
    pub fn print_summary(&self) {
        println!("\nSummary:");
        println!("{:-<40}", "");
        for f in &self.files {
            match &f.error {
                None => println!("  OK     {} ({} island(s), {} page(s), {} warning(s))",
                    f.input.display(), f.islands, f.pages, f.warnings.len()),
                Some(e) => println!("  FAILED {}: {}", f.input.display(), e),
            }
        }
        println!("{:-<40}", "");
        println!("Successful: {}", self.successful());
        println!("Failed:     {}", self.failed());
        println!("Total:      {}", self.files.len());
    }
}

/// `model.svg` for the first page, `model_2.svg` for the second one, and so on.
pub fn file_name_for_page(file_name: &Path, page: usize) -> PathBuf {
    if page == 0 {
        return file_name.to_owned();
    }
    let ext = file_name.extension().unwrap_or_default().to_string_lossy();
    let stem = file_name.file_stem().unwrap_or_default().to_string_lossy();
    let name = if ext.is_empty() {
        format!("{}_{}", stem, page + 1)
    } else {
        format!("{}_{}.{}", stem, page + 1, ext)
    };
    file_name.with_file_name(name)
}

/// Reads the model and unfolds it.
pub fn unfold_file(input: &Path, job: &Job) -> Result<Papercraft> {
    let model = waveobj::load_model(input)?;
    let mut options = job.options.clone();
    if job.auto_scale {
        options.auto_scale(&model);
        log::info!("{}: scale set to {}", input.display(), options.scale);
    }
    let papercraft = Papercraft::unfold(model, options)
        .with_context(|| format!("cannot unfold {}", input.display()))?;
    Ok(papercraft)
}

/// Every output file, fully generated in memory.
pub fn render(papercraft: &Papercraft, format: OutputFormat, output: &Path) -> Result<Vec<(PathBuf, Vec<u8>)>> {
    let pages = export_pages(papercraft);
    let files = match format {
        OutputFormat::Svg => pages
            .iter()
            .enumerate()
            .map(|(i, page)| Ok((file_name_for_page(output, i), vector_export::generate_svg(page)?.into_bytes())))
            .collect::<Result<Vec<_>>>()?,
        OutputFormat::Pdf => {
            let title = output.file_stem().unwrap_or_default().to_string_lossy();
            vec![(output.to_owned(), vector_export::generate_pdf(&pages, &title)?)]
        }
        OutputFormat::Json => vec![(output.to_owned(), vector_export::generate_json(&pages)?.into_bytes())],
    };
    Ok(files)
}

/// Writes every file, or none: if one fails the ones already written are removed.
pub fn write_outputs(files: Vec<(PathBuf, Vec<u8>)>) -> Result<Vec<PathBuf>> {
    let mut written: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (file_name, data) in files {
        if let Err(e) = std::fs::write(&file_name, data) {
            for f in &written {
                if let Err(err) = std::fs::remove_file(f) {
                    log::warn!("cannot remove {}: {}", f.display(), err);
                }
            }
            return Err(e).with_context(|| format!("cannot write {}", file_name.display()));
        }
        written.push(file_name);
    }
    Ok(written)
}

fn try_process(input: &Path, output: &Path, job: &Job) -> Result<FileReport> {
    let papercraft = unfold_file(input, job)?;
    let files = render(&papercraft, job.format, output)?;
    if files.is_empty() {
        log::warn!("{}: nothing fits in a page, no output", input.display());
    }
    let outputs = write_outputs(files)?;
    let model = papercraft.model();
    let scale = papercraft.options().scale;
    let paper_area = model.faces().map(|(i_face, _)| model.face_area(i_face)).sum::<f32>() * scale * scale;
    let omitted_islands = papercraft.islands().filter(|(_, island)| island.page().is_none()).count();
    let narrowest_flap = papercraft.islands()
        .flat_map(|(_, island)| island.flaps())
        .map(|flap| flap.width())
        .reduce(f32::min);
    Ok(FileReport {
        input: input.to_owned(),
        status: FileStatus::Ok,
        outputs,
        scale,
        paper_area,
        islands: papercraft.num_islands(),
        omitted_islands,
        narrowest_flap,
        pages: papercraft.pages().len(),
        warnings: papercraft.warnings().to_vec(),
        error: None,
    })
}

/// Processes a single file. Nothing that goes wrong, not even a panic, escapes the report.
pub fn process_file(input: &Path, output: &Path, job: &Job) -> FileReport {
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| try_process(input, output, job)));
    let report = match res {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => FileReport::failed(input, job.options.scale, format!("{e:#}")),
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| String::from("unknown panic"));
            FileReport::failed(input, job.options.scale, format!("internal error: {msg}"))
        }
    };
    match &report.error {
        None => log::info!("{}: {} island(s) in {} page(s)", input.display(), report.islands, report.pages),
        Some(e) => log::error!("{}: {}", input.display(), e),
    }
    report
}

/// The `*.obj` files of a directory, sorted by name.
pub fn find_inputs(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    let entries = std::fs::read_dir(input_dir)
        .with_context(|| format!("cannot read directory {}", input_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let is_obj = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("obj"));
        if is_obj && path.is_file() {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Processes every OBJ file in `input_dir` in parallel and writes `manifest.json` to `output_dir`.
pub fn run_batch(input_dir: &Path, output_dir: &Path, job: &Job) -> Result<BatchReport> {
    let inputs = find_inputs(input_dir)?;
    if inputs.is_empty() {
        return Err(anyhow!("no .obj files in {}", input_dir.display()));
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create directory {}", output_dir.display()))?;
    log::info!("processing {} file(s)", inputs.len());

    let files: Vec<FileReport> = inputs
        .par_iter()
        .map(|input| {
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            let output = output_dir.join(format!("{}_unfolded.{}", stem, job.format.extension()));
            process_file(input, &output, job)
        })
        .collect();

    let report = BatchReport { files };
    let manifest = output_dir.join("manifest.json");
    let f = std::fs::File::create(&manifest)
        .with_context(|| format!("cannot write {}", manifest.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(f), &report)?;
    Ok(report)
}
