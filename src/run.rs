//! Running the engine from the command line.

use crate::{console::ConsoleCommand, engine::Engine};
use anyhow::Result;
use std::path::Path;

/// Loads the given scene and executes each console command against it,
/// printing the output of each command.
pub fn run(scene_path: &Path, config_path: Option<&Path>, commands: &[String]) -> Result<()> {
    env_logger::init();

    let engine = Engine::load(scene_path, config_path)?;

    for command in commands {
        let command: ConsoleCommand = command.parse()?;
        print!("{}", engine.execute_command(&command)?);
    }
    Ok(())
}
