use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use slideshift::ooxml::PptxHostFactory;
use slideshift::{
    plan_and_apply_merge, plan_and_apply_update, ErrorResult, MergeRequest, MoveRequest, OutputArtifact,
    Planner, Result, Settings,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slideshift")]
#[command(about = "Reorder slides and copy slides between presentations")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "YAML settings file (defaults to $SLIDESHIFT_CONFIG)")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Print the move sequence for a batch without touching any file")]
    Plan {
        #[arg(long, help = "Slide count of the presentation")]
        count: usize,
        #[arg(long, help = "Slides to move (comma-separated, 1-based)")]
        slides: String,
        #[arg(long, help = "New positions, one per slide (comma-separated, 1-based)")]
        order: String,
    },
    #[command(about = "Move slides within a presentation")]
    Update {
        #[arg(long, help = "Path to the presentation")]
        input: PathBuf,
        #[arg(long, help = "Slides to move (comma-separated, 1-based)")]
        slides: String,
        #[arg(long, help = "New positions, one per slide (comma-separated, 1-based)")]
        order: String,
        #[arg(long, short, help = "Where to write the result (defaults to the configured file name)")]
        output: Option<PathBuf>,
    },
    #[command(about = "Copy one slide from a presentation into another")]
    Merge {
        #[arg(long, help = "Presentation to copy the slide from")]
        source: PathBuf,
        #[arg(long, help = "Presentation to insert the slide into")]
        target: PathBuf,
        #[arg(long, help = "Slide number in the source presentation")]
        slide: usize,
        #[arg(long, help = "Position in the target; one past the last slide appends")]
        position: usize,
        #[arg(long, short, help = "Where to write the result (defaults to the configured file name)")]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let result = ErrorResult::from(&e);
            eprintln!("Error: {}", result);
            if result.kind.is_user_error() {
                ExitCode::from(2)
            } else {
                ExitCode::from(3)
            }
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::from_env_or_default()?,
    };

    match cli.command {
        Commands::Plan { count, slides, order } => {
            let moves = MoveRequest::parse_batch(&slides, &order)?;
            let sequence = Planner::new(count).plan(&moves)?;
            if sequence.is_empty() {
                println!("nothing to do");
            }
            for (step, op) in sequence.iter().enumerate() {
                println!("{:>3}. {}", step + 1, op);
            }
            Ok(())
        },
        Commands::Update {
            input,
            slides,
            order,
            output,
        } => {
            let moves = MoveRequest::parse_batch(&slides, &order)?;
            let bytes = std::fs::read(&input)?;
            let artifact = plan_and_apply_update(&PptxHostFactory, &settings, &bytes, &moves)?;
            write_artifact(&artifact, output.as_deref())
        },
        Commands::Merge {
            source,
            target,
            slide,
            position,
            output,
        } => {
            let request = MergeRequest::new(slide, position);
            let source = std::fs::read(&source)?;
            let target = std::fs::read(&target)?;
            let artifact = plan_and_apply_merge(&PptxHostFactory, &settings, &source, &target, request)?;
            write_artifact(&artifact, output.as_deref())
        },
    }
}

fn write_artifact(artifact: &OutputArtifact, output: Option<&Path>) -> Result<()> {
    let path = output.unwrap_or_else(|| Path::new(&artifact.file_name));
    std::fs::write(path, &artifact.bytes)?;
    info!(path = %path.display(), size = artifact.bytes.len(), "wrote presentation");
    Ok(())
}
