//! DSLX CLI: command-line interface for the DSLX bytecode interpreter.

use clap::{Parser as ClapParser, Subcommand};
use dslx_cli::colors::{bold, green, red, status_label};
use dslx_cli::commands;
use dslx_cli::config::DslxConfig;
use dslx_cli::test_cmd::{self, TestOptions};
use dslx_cli::{logging, CliError};
use dslx_vm::VmOptions;
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "dslx", version, about = "The DSLX bytecode interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and execute a bytecode file
    Run {
        /// Path to the .bc file
        #[arg()]
        file: PathBuf,

        /// Entry function name
        #[arg(long, default_value = "main")]
        entry: String,

        /// Argument literal, in order (e.g. `--arg u32:5`)
        #[arg(long = "arg")]
        args: Vec<String>,

        /// Instruction limit (overrides dslx.toml)
        #[arg(long)]
        limit: Option<u64>,

        /// Print the result or error as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse and resolve a bytecode file without running it
    Check {
        #[arg()]
        file: PathBuf,
    },
    /// Rewrite a bytecode file in canonical form
    Fmt {
        #[arg()]
        file: PathBuf,
        /// Check mode: exit 1 if the file would change
        #[arg(long)]
        check: bool,
    },
    /// Emit a bytecode file as JSON
    Emit {
        #[arg()]
        file: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run every `test_*` function found under a path
    Test {
        /// File or directory to search for .bc files
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only run tests whose name contains this string
        #[arg(long)]
        filter: Option<String>,

        /// Worker threads (default: one per CPU)
        #[arg(long, short)]
        jobs: Option<usize>,
    },
    /// Create a dslx.toml config file in the current directory
    Init,
}

fn main() {
    let cli = Cli::parse();

    let config = DslxConfig::load().unwrap_or_else(|e| {
        eprintln!("{} {}", red("error:"), e);
        std::process::exit(1);
    });
    logging::init(config.log.filter.as_deref());

    let outcome = match cli.command {
        Commands::Run {
            file,
            entry,
            args,
            limit,
            json,
        } => {
            let mut options = config.vm;
            if limit.is_some() {
                options.instruction_limit = limit;
            }
            cmd_run(&file, &entry, &args, options, json)
        }
        Commands::Check { file } => commands::cmd_check(&file).map(|summary| {
            println!("{} {}: {}", green("✓"), file.display(), summary);
            true
        }),
        Commands::Fmt { file, check } => commands::cmd_fmt(&file, check).map(|changed| {
            match (changed, check) {
                (true, true) => println!("{} {} would be reformatted", red("✗"), bold(&file.display().to_string())),
                (true, false) => println!("{} {}", status_label("Formatted"), file.display()),
                (false, _) => {}
            }
            !(changed && check)
        }),
        Commands::Emit { file, output } => {
            commands::cmd_emit(&file, output.as_deref()).map(|json| {
                match output {
                    Some(out) => println!("{} program to {}", status_label("Emitting"), out.display()),
                    None => println!("{}", json),
                }
                true
            })
        }
        Commands::Test { path, filter, jobs } => {
            let options = TestOptions {
                filter,
                jobs,
                vm: config.vm,
            };
            test_cmd::cmd_test(&path, &options).map(|summary| summary.is_success())
        }
        Commands::Init => {
            let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            commands::cmd_init(&dir).map(|path| {
                println!("{} {}", status_label("Created"), path.display());
                true
            })
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", red("error:"), e);
            std::process::exit(1);
        }
    }
}

fn cmd_run(
    file: &std::path::Path,
    entry: &str,
    args: &[String],
    options: VmOptions,
    json: bool,
) -> Result<bool, CliError> {
    let (output, ok) = commands::cmd_run(file, entry, args, options, json)?;
    if ok || json {
        println!("{}", output);
    } else {
        eprintln!("{} {}", red("runtime error:"), output);
    }
    Ok(ok)
}
