//! Reduces a transition system in `.aut` format modulo bisimulation.
//!
//! Run with:
//! ```bash
//! cargo run --example reduce -- system.aut --equivalence branching --tau internal
//! cargo run --example reduce -- left.aut --compare right.aut
//! ```
//!
//! Without a file, a small built-in system is used.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{bail, eyre, WrapErr};
use pbes_bisim::compare::compare;
use pbes_bisim::dot::lts_to_dot;
use pbes_bisim::lts::{LabelledTransitions, Lts};
use pbes_bisim::reduce::{reduce, Equivalence, ReductionOptions};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bisimulation reduction of labelled transition systems")]
struct Cli {
    /// Input file in .aut format
    input: Option<PathBuf>,

    /// Equivalence to reduce modulo: strong or branching
    #[arg(short, long, default_value = "strong")]
    equivalence: Equivalence,

    /// Action names to treat as tau
    #[arg(long = "tau", value_delimiter = ',')]
    tau_actions: Vec<String>,

    /// Compare with this system instead of reducing
    #[arg(long)]
    compare: Option<PathBuf>,

    /// Print the result as DOT instead of .aut
    #[arg(long)]
    dot: bool,

    /// Upper bound on the number of splitters
    #[arg(long)]
    max_iterations: Option<usize>,
}

fn parse_aut(text: &str) -> color_eyre::Result<Lts> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let header = lines.next().ok_or_else(|| eyre!("empty input"))?;
    let numbers: Vec<usize> = header
        .strip_prefix("des")
        .map(|h| h.trim().trim_start_matches('(').trim_end_matches(')'))
        .ok_or_else(|| eyre!("bad header: {}", header))?
        .split(',')
        .map(|n| n.trim().parse())
        .collect::<Result<_, _>>()
        .wrap_err("bad header")?;
    let &[initial, _, num_states] = numbers.as_slice() else {
        bail!("bad header: {}", header);
    };

    let mut lts = Lts::new(num_states, initial)?;
    for line in lines {
        let inner = line.trim_start_matches('(').trim_end_matches(')');
        let (from, rest) = inner.split_once(',').ok_or_else(|| eyre!("bad line: {}", line))?;
        let (label, to) = rest.rsplit_once(',').ok_or_else(|| eyre!("bad line: {}", line))?;
        let label = lts.add_label(label.trim().trim_matches('"'));
        lts.add_transition(from.trim().parse()?, label, to.trim().parse()?)?;
    }
    Ok(lts)
}

fn load(path: &Option<PathBuf>) -> color_eyre::Result<Lts> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
            parse_aut(&text)
        }
        None => Ok(Lts::from_transitions(
            5,
            0,
            [(0, "tau", 1), (0, "a", 2), (1, "a", 2), (2, "b", 3), (2, "b", 4), (4, "tau", 3)],
        )?),
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();
    let options = ReductionOptions {
        equivalence: cli.equivalence,
        tau_actions: cli.tau_actions.clone(),
        omit_tau_loops: None,
        max_iterations: cli.max_iterations,
    };

    let lts = load(&cli.input)?;
    println!(
        "input: {} states, {} transitions",
        lts.num_states(),
        lts.num_transitions()
    );

    if let Some(other) = &cli.compare {
        let other = load(&Some(other.clone()))?;
        let comparison = compare(&lts, &other, &options)?;
        if comparison.bisimilar {
            println!("{} bisimilar", cli.equivalence);
        } else {
            println!("not {} bisimilar", cli.equivalence);
            if let Some(witness) = comparison.witness {
                println!("witness: {}", witness);
            }
        }
        return Ok(());
    }

    let time = std::time::Instant::now();
    let reduction = reduce(&lts, &options)?;
    println!(
        "reduced to {} states, {} transitions in {:.2?} ({} passes, {} splits)",
        reduction.lts.num_states(),
        reduction.lts.num_transitions(),
        time.elapsed(),
        reduction.stats.passes,
        reduction.stats.splits
    );
    if cli.dot {
        print!("{}", lts_to_dot(&reduction.lts)?);
    } else {
        print!("{}", reduction.lts);
    }
    Ok(())
}
