use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context as _;
use ast::Parse as _;
use clap::Parser;
use makefile::Makefile;
use parser::TemplateFile;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod ast;
mod error;
mod expand;
mod makefile;
mod parser;
mod tokenizer;
mod validate;

/// Expands a templated makefile into a plain one.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Template to expand
    #[arg(default_value = "TMakefile")]
    input: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the parsed variables and rules instead of expanding them
    #[arg(long)]
    dump: bool,

    /// More logging (-v info, -vv debug, -vvv trace); RUST_LOG wins if set
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn run(args: &Args) -> anyhow::Result<()> {
    info!("Parsing {}", args.input.display());
    let data = match std::fs::read_to_string(&args.input) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            anyhow::bail!("'{}' does not exist!", args.input.display())
        }
        Err(err) => {
            return Err(err).with_context(|| format!("reading {}", args.input.display()))
        }
    };

    let mut file = TemplateFile::parse(&data)?;
    file.default_empty_values();

    if args.dump {
        let mut out = open_output(args.output.as_deref())?;
        write!(out, "{}", file)?;
        out.flush()?;
        return Ok(());
    }

    // Nothing is written unless every rule expands.
    let makefile = Makefile::generate(&file)?;
    makefile.write_to(open_output(args.output.as_deref())?)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
