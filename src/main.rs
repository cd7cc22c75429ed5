use clap::{Parser, Subcommand};
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use solder::generate::{check, diff, generate, show, DiffOutcome, Options};
use std::path::PathBuf;
use std::process;
use vfs::{PhysicalFS, VfsPath};

#[derive(Parser, Debug)]
#[command(version, about = "Compile-time dependency injection code generator", long_about = None)]
struct Cli {
    /// The workspace directory containing Solder.toml.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Treat unused provider-set members as errors.
    #[arg(long)]
    strict_unused: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate solder_gen.sld for each package with injectors.
    Gen { pkgs: Vec<String> },
    /// Report whether generated files are out of date.
    Diff { pkgs: Vec<String> },
    /// Describe provider sets and injectors.
    Show { pkgs: Vec<String> },
    /// Run the analysis and report diagnostics without generating.
    Check { pkgs: Vec<String> },
}

fn main() {
    let cli = Cli::parse();
    let root = VfsPath::new(PhysicalFS::new(cli.dir.clone()));
    let opts = Options {
        strict_unused: cli.strict_unused.then_some(true),
    };
    let writer = StandardStream::stderr(ColorChoice::Auto);
    let mut writer = writer.lock();

    let command = cli.command.unwrap_or(Command::Gen { pkgs: Vec::new() });
    let code = match command {
        Command::Gen { pkgs } => match generate(&root, &pkgs, &opts, &mut writer) {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                eprintln!("solder: {:#}", e);
                1
            }
        },
        Command::Diff { pkgs } => match diff(&root, &pkgs, &opts, &mut writer) {
            Ok(DiffOutcome::Clean) => 0,
            Ok(DiffOutcome::Changed) => 1,
            Ok(DiffOutcome::Failed) => 2,
            Err(e) => {
                eprintln!("solder: {:#}", e);
                2
            }
        },
        Command::Show { pkgs } => match show(&root, &pkgs, &opts, &mut writer) {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                eprintln!("solder: {:#}", e);
                1
            }
        },
        Command::Check { pkgs } => match check(&root, &pkgs, &opts, &mut writer) {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                eprintln!("solder: {:#}", e);
                1
            }
        },
    };
    process::exit(code);
}
