use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::debug;
use patch_stager::diff::PatchEntry;
use patch_stager::{
    InputError, Patch, PatchDirection, PatchStagerError, Stager, parse_file_refs, parse_line_numbers,
};

#[derive(Parser)]
#[command(name = "patch-stager", version)]
#[command(about = "Build patches that stage, unstage or discard single lines of a git diff")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a diff and summarize each file in it
    Check {
        /// Diff to read; stdin when omitted
        path: Option<PathBuf>,
        /// Print the diff with 1-based line numbers for --lines
        #[arg(long)]
        numbered: bool,
    },
    /// Print a patch containing only the selected changes
    ///
    /// Pipe the output to `git apply` with the flags printed on stderr.
    Select {
        /// Diff to read; stdin when omitted
        path: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = DirectionArg::Stage)]
        direction: DirectionArg,
        /// Select every change in each touched hunk
        #[arg(long)]
        hunk: bool,
        /// File and line references (e.g., "flake.nix:137" or "flake.nix:10..15,-20")
        #[arg(long = "ref", value_name = "FILE:REFS")]
        refs: Vec<String>,
        /// Diff line numbers (e.g., "7,9..12")
        #[arg(long, value_name = "N,N..M")]
        lines: Option<String>,
    },
    /// Print shell completions
    Completions { shell: Shell },
    /// Print a roff man page
    Man,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Stage,
    Unstage,
    Discard,
}

impl From<DirectionArg> for PatchDirection {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::Stage => Self::Stage,
            DirectionArg::Unstage => Self::Unstage,
            DirectionArg::Discard => Self::Discard,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), PatchStagerError> {
    match command {
        Commands::Check { path, numbered } => {
            let patch = Patch::parse_bytes(&read_input(path.as_deref())?)?;
            let mut out = io::stdout().lock();
            if numbered {
                for index in 0..patch.text().lines().len() {
                    write_stdout(writeln!(out, "{:>5} {}", index + 1, patch.text().line_text(index)))?;
                }
            } else {
                for entry in patch.entries() {
                    write_stdout(writeln!(out, "{}", summarize(entry)))?;
                }
            }
        }
        Commands::Select {
            path,
            direction,
            hunk,
            refs,
            lines,
        } => {
            let direction = PatchDirection::from(direction);
            let stager = Stager::parse_bytes(&read_input(path.as_deref())?)?.whole_hunks(hunk);

            let mut selected = Vec::new();
            for file_ref in &refs {
                selected.extend(parse_file_refs(file_ref)?.resolve(stager.patch())?);
            }
            if let Some(lines) = lines {
                selected.extend(parse_line_numbers(&lines)?);
            }
            debug!("{} lines requested for {direction}", selected.len());

            let patch = stager.select(&selected, direction)?;
            write_stdout(io::stdout().lock().write_all(patch.to_string().as_bytes()))?;
            eprintln!("apply with: git apply {}", direction.apply_args().join(" "));
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "patch-stager", &mut io::stdout());
        }
        Commands::Man => {
            write_stdout(clap_mangen::Man::new(Cli::command()).render(&mut io::stdout()))?;
        }
    }
    Ok(())
}

/// One line describing an entry: change kind, paths, modes and hunk count.
fn summarize(entry: &PatchEntry) -> String {
    let paths = match (entry.old_path(), entry.new_path()) {
        (old, new) if !old.is_empty() && !new.is_empty() && old != new => format!("{old} -> {new}"),
        _ => entry.path().to_string(),
    };
    let modes = if entry.old_mode() == entry.new_mode() {
        entry.new_mode().to_string()
    } else {
        format!("{} -> {}", entry.old_mode(), entry.new_mode())
    };
    format!(
        "{:<12} {paths} ({modes}, {} hunks)",
        entry.change_kind().to_string(),
        entry.hunks().len()
    )
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>, InputError> {
    match path {
        Some(path) => fs::read(path).map_err(|e| InputError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        None => {
            let mut bytes = Vec::new();
            io::stdin()
                .read_to_end(&mut bytes)
                .map_err(|e| InputError::ReadFailed {
                    path: "stdin".to_string(),
                    message: e.to_string(),
                })?;
            Ok(bytes)
        }
    }
}

fn write_stdout(result: io::Result<()>) -> Result<(), InputError> {
    result.map_err(|e| InputError::WriteFailed {
        message: e.to_string(),
    })
}
