use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

impl From<CompletionShell> for Shell {
    fn from(value: CompletionShell) -> Self {
        match value {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
        }
    }
}

/// Write the completion script to `output_path`, or stdout when absent.
pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    match output_path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_completions(shell, &mut writer);
            writer.flush()?;
            eprintln!("Wrote {} completions to {}", Shell::from(shell), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            write_completions(shell, &mut stdout);
            stdout.flush()?;
        }
    }
    Ok(())
}

pub fn write_completions(shell: CompletionShell, writer: &mut dyn Write) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(Shell::from(shell), &mut command, name, writer);
}
