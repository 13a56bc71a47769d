use std::path::PathBuf;

use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt};

use hybridc::{
    backend::{CodegenOptions, DEFAULT_RUNTIME_NAME, diagnostics::Diagnostics, targets::Target},
    config::Config,
    driver::{self, Outcome},
    error::Error,
    middle::cfg::ControlFlowStrategy,
};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Hybrid IR document written by the Go frontend.
    input: PathBuf,

    /// Directory that receives `main.rs` and the runtime module.
    output_dir: PathBuf,

    /// How block graphs become Rust control flow.
    #[arg(long, value_enum, default_value_t = ControlFlowStrategy::Structured)]
    control_flow: ControlFlowStrategy,

    #[arg(long, value_enum, default_value_t = Target::Rust)]
    target: Target,

    /// Print the loaded IR instead of generating code.
    #[arg(long)]
    dump_ir: bool,

    /// Fail, writing nothing, if any warning is reported.
    #[arg(long)]
    deny_warnings: bool,

    /// Module name of the emitted runtime file.
    #[arg(long, default_value = DEFAULT_RUNTIME_NAME)]
    runtime_name: String,

    /// Debug logging and generator backtraces on warnings.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("HYBRIDC_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();

    if !args.input.exists() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Input file '{}' does not exist!", args.input.display()),
            )
            .exit()
    }

    if !args.input.is_file() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Input path '{}' is not a file!", args.input.display()),
            )
            .exit()
    }

    let valid_module_name = args
        .runtime_name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && args
            .runtime_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && args.runtime_name != "main";
    if !valid_module_name {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("'{}' is not a usable module name!", args.runtime_name),
            )
            .exit()
    }

    init_logging(args.verbose);

    let config = Config {
        codegen: CodegenOptions {
            control_flow: args.control_flow,
            runtime_name: args.runtime_name,
        },
        dump_ir: args.dump_ir,
        deny_warnings: args.deny_warnings,
        target: args.target,
        ..Config::new(args.input, args.output_dir)
    };

    let mut diagnostics = Diagnostics::new();
    let result = driver::run(&config, &mut diagnostics);
    eprint!("{}", diagnostics.render(args.verbose));

    match result {
        Ok(Outcome::Dumped(listing)) => print!("{listing}"),
        Ok(Outcome::Written(paths)) => {
            for path in paths {
                println!("{} {}", "wrote".green().bold(), path.display());
            }
        }
        Err(err) => {
            report_error(&err);
            std::process::exit(1);
        }
    }
}

fn report_error(err: &Error) {
    eprintln!("{}: {err}", "error".red().bold());
    if let Error::Parse { snippet, .. } = err {
        for line in snippet.lines() {
            eprintln!("  {} {line}", "|".blue().bold());
        }
    }
}
