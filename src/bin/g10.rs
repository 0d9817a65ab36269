use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use g10::{io::write_ron_file, run, scene::SceneConfig};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "The G10 engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a scene and run debug console commands against it
    Run {
        /// Path to RON scene description file
        scene: PathBuf,
        /// Path to RON scene configuration file to use
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Console commands to execute, such as `bvh.dump` or
        /// `bvh.query 0 0 0 1 1 1`
        #[arg(short = 'x', long = "execute", default_value = "bvh.stats")]
        commands: Vec<String>,
    },
    /// Generate the default RON scene configuration file
    GenerateConfig {
        /// Path where the file should be written
        #[arg(short, long)]
        output_path: PathBuf,
        /// Overwrite any existing file at the given path
        #[arg(short, long)]
        force_overwrite: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            scene,
            config,
            commands,
        } => run::run(&scene, config.as_deref(), &commands),
        Command::GenerateConfig {
            output_path,
            force_overwrite,
        } => {
            if !force_overwrite && output_path.exists() {
                bail!("File {} already exists", output_path.display());
            }
            write_ron_file(&SceneConfig::default(), output_path)
        }
    }
}
