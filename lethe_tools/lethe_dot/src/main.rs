extern crate anyhow;
extern crate clap;
extern crate log;
extern crate rand;
extern crate simplelog;

use std::env::temp_dir;
use std::fs::File;
use std::io::prelude::*;
use std::process::Command;

use anyhow::Context;
use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    lir_file: String,

    #[arg(short, long, default_value_t = String::new())]
    output: String,

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
        eprintln!("WARNING: Running lethe_dot on a file without a .lir extension - interpreting as a textual Lethe IR file.");
    }

    let mut file = File::open(&args.lir_file)
        .with_context(|| format!("unable to open input file {}", args.lir_file))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .context("unable to read input file contents")?;
    let module = lethe_ir::parse::parse(&contents)
        .with_context(|| format!("failed to parse {}", args.lir_file))?;
    lethe_ir::verify::verify(&module).context("failed to verify Lethe IR module")?;

    // Only analyze. The graph shows the module as written, with the stores
    // that would be removed drawn in red.
    let mut pm = lethe_opt::pass::PassManager::new(module);
    pm.set_sweep_limit(args.sweep_limit);
    let dead_stores = pm.dead_stores().context("failed to analyze module")?;
    log::info!(
        "{} dead store(s) found.",
        dead_stores.iter().map(|dead| dead.len()).sum::<usize>()
    );

    let mut contents = String::new();
    lethe_ir::dot::write_dot(pm.module(), Some(&dead_stores[..]), &mut contents)
        .context("unable to generate output file contents")?;

    if args.output.is_empty() {
        let mut tmp_path = temp_dir();
        tmp_path.push(format!("lethe_dot_{}.dot", rand::random::<u32>()));
        let mut file = File::create(&tmp_path).context("unable to open output file")?;
        file.write_all(contents.as_bytes())
            .context("unable to write output file contents")?;
        Command::new("xdot")
            .args([&tmp_path])
            .output()
            .context("couldn't execute xdot")?;
    } else {
        let mut file = File::create(&args.output)
            .with_context(|| format!("unable to open output file {}", args.output))?;
        file.write_all(contents.as_bytes())
            .context("unable to write output file contents")?;
    }
    Ok(())
}
