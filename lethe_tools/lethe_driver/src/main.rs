extern crate anyhow;
extern crate clap;
extern crate log;
extern crate simplelog;

use std::fs::File;
use std::io::prelude::*;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    lir_file: String,

    #[arg(short, long, default_value_t = String::from("verify,dse,print"))]
    passes: String,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    sweep_limit: Option<usize>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("unable to initialize logger")?;

    if !args.lir_file.ends_with(".lir") {
        eprintln!("WARNING: Running lethe_driver on a file without a .lir extension - interpreting as a textual Lethe IR file.");
    }

    let mut file = File::open(&args.lir_file)
        .with_context(|| format!("unable to open input file {}", args.lir_file))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .context("unable to read input file contents")?;
    let module = lethe_ir::parse::parse(&contents)
        .with_context(|| format!("failed to parse {}", args.lir_file))?;

    let passes = lethe_opt::pass::parse_passes(&args.passes)
        .context("couldn't parse list of passes")?;
    let mut pm = lethe_opt::pass::PassManager::new(module);
    pm.set_sweep_limit(args.sweep_limit);
    pm.set_output(args.output);
    for pass in passes {
        pm.add_pass(pass);
    }
    pm.run_passes().context("failed to run passes")?;

    for (routine, removed) in pm.module().routines.iter().zip(pm.stores_removed()) {
        log::info!("{}: {} store(s) removed", routine.name, removed);
    }
    Ok(())
}
