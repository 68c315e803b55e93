use clap::{Parser, Subcommand};
use imgpipe::capabilities::{Capabilities, NoDetector, StaticProbe, SubjectImage};
use imgpipe::config::{self, PipelineConfig};
use imgpipe::execute::{self, InputImage, RunOptions};
use imgpipe::imaging::rust_backend::is_supported_input;
use imgpipe::imaging::{RasterBackend, RustBackend};
use imgpipe::task::Task;
use imgpipe::{naming, output, serializer};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

fn version_string() -> &'static str {
    let release = env!("IMGPIPE_RELEASE");
    if release == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("IMGPIPE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imgpipe")]
#[command(about = "Validated, ordered image-processing tasks")]
#[command(long_about = "\
Validated, ordered image-processing tasks

A task is a JSON file listing processing steps. Steps always run in a fixed
order regardless of how they are listed:

  resize → crop → template → optimize → favicon → rename

Each step is checked before anything runs: errors block execution, warnings
explain what will happen (quality loss, upscaling, lost transparency).

Step kinds and their main options:

  resize    dimension, mode (longest|width|height), upscale, forceSquare
  crop      width, height, mode (center|top|...|smart|face|object)
  template  templateId (instagram-square, open-graph, web-hero, ...)
  optimize  quality, format (auto|jpg|png|webp|avif or a list)
  favicon   sizes, formats (png|ico|svg), generateManifest, generateHtml
  rename    pattern ({name} {index} {timestamp} {width} {height} {dimensions})

Defaults for every option can be set in imgpipe.toml. Run
'imgpipe gen-config' to generate a documented one.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./imgpipe.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Source image description for image-aware validation.
#[derive(clap::Args, Clone)]
struct SourceArgs {
    /// Identify this image and validate against it
    #[arg(long, conflicts_with_all = ["width", "height"])]
    image: Option<PathBuf>,

    /// Source width in pixels
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Source height in pixels
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Source MIME type, e.g. image/png
    #[arg(long, default_value = "image/jpeg")]
    format: String,

    /// Source has transparent pixels
    #[arg(long)]
    transparent: bool,
}

impl SourceArgs {
    fn subject(
        &self,
        backend: &dyn RasterBackend,
    ) -> Result<Option<SubjectImage>, Box<dyn std::error::Error>> {
        if let Some(path) = &self.image {
            return Ok(Some(backend.identify(&std::fs::read(path)?)?));
        }
        Ok(match (self.width, self.height) {
            (Some(w), Some(h)) => Some(SubjectImage::new(
                w,
                h,
                self.format.as_str(),
                self.transparent,
            )),
            _ => None,
        })
    }
}

#[derive(Subcommand)]
enum Command {
    /// List a task's steps
    Show { task: PathBuf },
    /// Validate a task file and print its summary
    Validate {
        task: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Estimate processing time for a number of images
    Estimate {
        task: PathBuf,
        /// Number of images to estimate for
        #[arg(long, default_value_t = 1)]
        images: usize,
    },
    /// Run a task over images and directories of images
    Run {
        task: PathBuf,
        /// Image files or directories (searched recursively)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "out")]
        output: PathBuf,
        /// Trust the validation stored in the task file instead of re-validating
        #[arg(long)]
        no_validate: bool,
    },
    /// Create a task file from step arguments
    New {
        name: String,
        /// Step as KIND or KIND:JSON, e.g. 'resize:{"dimension":800}' (repeatable)
        #[arg(long = "step", value_name = "KIND[:JSON]")]
        steps: Vec<String>,
        #[arg(long)]
        description: Option<String>,
        /// Task file to write (default: <name>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Copy a task with fresh ids
    Clone {
        task: PathBuf,
        /// Name for the copy (default: "<name> (copy)")
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a stock imgpipe.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Show { task } => {
            let config = load_config(cli.config.as_deref())?;
            let task = serializer::load(&task, config.resolver())?;
            output::print_task(&task);
        }
        Command::Validate { task, source } => {
            let config = load_config(cli.config.as_deref())?;
            let mut task = serializer::load(&task, config.resolver())?;
            let subject = source.subject(&RustBackend::new())?;
            let result = validate(&mut task, subject.as_ref());
            output::print_validation_report(&result);
            output::print_summary(&task.validation_summary());
            if !result.is_valid() {
                return Err("task has validation errors".into());
            }
        }
        Command::Estimate { task, images } => {
            let config = load_config(cli.config.as_deref())?;
            let task = serializer::load(&task, config.resolver())?;
            output::print_estimate(&task.time_estimate(images), images);
        }
        Command::Run {
            task,
            inputs,
            output: out_dir,
            no_validate,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let mut task = serializer::load(&task, config.resolver())?;
            let backend = RustBackend::new();

            let paths = collect_inputs(&inputs);
            if paths.is_empty() {
                return Err("no supported images found in inputs".into());
            }
            let images = paths
                .iter()
                .map(|p| InputImage::read(p))
                .collect::<Result<Vec<_>, _>>()?;

            if !no_validate {
                let subject = backend.identify(&images[0].bytes).ok();
                let result = validate(&mut task, subject.as_ref());
                if result.messages().next().is_some() {
                    output::print_validation_report(&result);
                }
            }

            init_thread_pool(&config.processing);
            let options = RunOptions {
                block_on_warnings: config.execution.block_on_warnings,
                ..RunOptions::default()
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_execute_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let results =
                execute::execute_batch(&task, &backend, &NoDetector, &images, &options, Some(tx));
            printer.join().map_err(|_| "output printer panicked")?;

            let mut written = 0;
            let mut failed = 0;
            for result in results? {
                match result {
                    Ok(outputs) => {
                        for file in &outputs.files {
                            file.write_to(&out_dir)?;
                            written += 1;
                        }
                    }
                    Err(_) => failed += 1,
                }
            }
            println!(
                "Wrote {} files to {} ({} images, {} failed)",
                written,
                out_dir.display(),
                images.len(),
                failed
            );
            if failed > 0 {
                return Err(format!("{failed} images failed").into());
            }
        }
        Command::New {
            name,
            steps,
            description,
            output: path,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let mut task = Task::new(&name).with_resolver(config.resolver());
            if let Some(description) = description {
                task = task.with_description(description);
            }
            for arg in &steps {
                let (kind, raw) = parse_step_arg(arg)?;
                task.add_step(kind, raw)?;
            }
            let result = validate(&mut task, None);
            output::print_task(&task);
            output::print_validation_report(&result);

            let path =
                path.unwrap_or_else(|| PathBuf::from(format!("{}.json", naming::sanitize(&name))));
            serializer::save(&task, &path)?;
            println!("Saved {}", path.display());
        }
        Command::Clone {
            task,
            name,
            output: path,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let source = serializer::load(&task, config.resolver())?;
            let copy = match name {
                Some(name) => serializer::instantiate(
                    &serializer::export(&source),
                    &name,
                    source.resolver().clone(),
                )?,
                None => serializer::clone_task(&source)?,
            };
            serializer::save(&copy, &path)?;
            println!("Saved {} as {}", copy.name, path.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the explicit config file, or `imgpipe.toml` in the working directory.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(".")),
    }
}

/// Validate with a probe that reports no subject detectors.
fn validate(
    task: &mut Task,
    subject: Option<&SubjectImage>,
) -> imgpipe::validation::ValidationResult {
    task.validate_with_probe(subject, &StaticProbe(Capabilities::pixels_only()))
}

/// Split `kind` or `kind:{json}` into the kind and its raw options.
fn parse_step_arg(arg: &str) -> Result<(&str, serde_json::Value), serde_json::Error> {
    match arg.split_once(':') {
        Some((kind, json)) => Ok((kind.trim(), serde_json::from_str(json)?)),
        None => Ok((arg.trim(), serde_json::Value::Object(Default::default()))),
    }
}

/// Expand directories into the supported images they contain, sorted by path.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(is_supported_input)
                })
                .collect();
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }
    paths
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
