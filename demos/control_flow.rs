//! Runs the control flow analysis on a small built-in equation system and
//! prints every intermediate result.
//!
//! Run with:
//! ```bash
//! cargo run --example control_flow -- --dot
//! ```

use clap::Parser;
use pbes_bisim::control_flow::{ControlFlowAlgorithm, ControlFlowOptions};
use pbes_bisim::data::{DataExpr, Sort, Variable};
use pbes_bisim::dot::control_flow_graph_to_dot;
use pbes_bisim::pbes::{FixpointSymbol, Pbes, PbesEquation, PbesExpr, PropVarInst, PropositionalVariable};

#[derive(Debug, Parser)]
#[command(author, version, about = "Control flow analysis of a PBES")]
struct Cli {
    /// Do not simplify guards and the result
    #[arg(long)]
    no_simplify: bool,

    /// Upper bound on the iterations of each fixpoint computation
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Print the control flow graph in DOT format
    #[arg(long)]
    dot: bool,
}

/// A one-place buffer that reads a value, stores it in `d` and writes it back.
/// The counter `n` is only used for a bound in the reading state.
///
/// ```text
/// nu X(s: Nat, d: Nat, n: Nat) =
///        (val(s == 0 && n < 3) => X(1, n, n + 1))
///     && (val(s == 1) => Y(d) || X(2, d, n))
///     && (val(s == 2) => X(0, 0, n));
/// mu Y(e: Nat) = val(e > 10) || Y(e + 1);
/// ```
fn buffer() -> Pbes {
    let nat = |name: &str| Variable::new(name, Sort::Nat);
    let (s, d, n, e) = (nat("s"), nat("d"), nat("n"), nat("e"));
    let v = |x: &Variable| DataExpr::from(x);
    let int = DataExpr::int;

    let x = PbesExpr::join_and(vec![
        PbesExpr::imp(
            PbesExpr::val(DataExpr::and(
                DataExpr::eq(v(&s), int(0)),
                DataExpr::lt(v(&n), int(3)),
            )),
            PbesExpr::propvar("X", vec![int(1), v(&n), DataExpr::add(v(&n), int(1))]),
        ),
        PbesExpr::imp(
            PbesExpr::val(DataExpr::eq(v(&s), int(1))),
            PbesExpr::or(
                PbesExpr::propvar("Y", vec![v(&d)]),
                PbesExpr::propvar("X", vec![int(2), v(&d), v(&n)]),
            ),
        ),
        PbesExpr::imp(
            PbesExpr::val(DataExpr::eq(v(&s), int(2))),
            PbesExpr::propvar("X", vec![int(0), int(0), v(&n)]),
        ),
    ]);
    let y = PbesExpr::or(
        PbesExpr::val(DataExpr::gt(v(&e), int(10))),
        PbesExpr::propvar("Y", vec![DataExpr::add(v(&e), int(1))]),
    );

    Pbes::new(
        vec![
            PbesEquation::new(FixpointSymbol::Nu, PropositionalVariable::new("X", vec![s, d, n]), x),
            PbesEquation::new(FixpointSymbol::Mu, PropositionalVariable::new("Y", vec![e]), y),
        ],
        PropVarInst::new("X", vec![int(0), int(0), int(0)]),
    )
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
    let options = ControlFlowOptions {
        simplify: !cli.no_simplify,
        max_iterations: cli.max_iterations,
    };
    let algorithm = ControlFlowAlgorithm::new(options);

    let p = buffer();
    println!("--- input ---\n{}", p);

    let analysis = algorithm.run(&p)?;
    println!("--- pfnf ---\n{}", analysis.pfnf);
    println!("--- influence graph ---\n{}", analysis.influence);
    println!("--- source/destination ---\n{}", analysis.source_destination.print(&analysis.pfnf));
    println!("{}", analysis.parameters);
    println!("{}", analysis.graph);

    let result = algorithm.reset_with(&p, &analysis)?;
    println!("--- result ---\n{}", result);

    if cli.dot {
        print!("{}", control_flow_graph_to_dot(&analysis.graph)?);
    }
    Ok(())
}
