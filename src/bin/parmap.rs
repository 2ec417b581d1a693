use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use log::{error, info};
use serde::Serialize;
use serde_json::{json, Value};

use parmap::{
    monoid, ParError, RayonThreadPool, Reducer, Result, SharedQueueThreadPool, ThreadPool,
};

#[derive(Parser)]
#[command(
    name = "parmap",
    version,
    about = "Run parallel list operations over integers"
)]
struct Cli {
    /// Operation to run over the input
    #[arg(value_enum)]
    op: Op,

    /// Number of threads (defaults to the number of CPUs)
    #[arg(long, short = 't', value_name = "N")]
    threads: Option<usize>,

    /// Where slices are executed
    #[arg(long, value_enum, default_value_t = Mode::Pooled)]
    mode: Mode,

    /// Read whitespace separated integers from FILE instead of stdin
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Print the result as a JSON object
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Op {
    Max,
    Min,
    Sum,
    SumSquares,
    Join,
    Evens,
    Squares,
    AllEven,
    AnyEven,
}

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Mode {
    /// Persistent shared-queue worker pool
    Pooled,
    /// Pool backed by rayon
    Rayon,
    /// One thread per slice, per call
    Ephemeral,
}

#[derive(Serialize)]
struct Report {
    op: Op,
    mode: Mode,
    threads: usize,
    result: Value,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let threads = cli.threads.unwrap_or_else(num_cpus::get);
    let values = read_values(cli.input.as_ref())?;

    info!("parmap {}", env!("CARGO_PKG_VERSION"));
    info!(
        "{:?} over {} values with {} threads ({:?})",
        cli.op,
        values.len(),
        threads,
        cli.mode
    );

    let result = match cli.mode {
        Mode::Pooled => run_pooled::<SharedQueueThreadPool>(cli.op, threads, values)?,
        Mode::Rayon => run_pooled::<RayonThreadPool>(cli.op, threads, values)?,
        Mode::Ephemeral => execute(&Reducer::new(), cli.op, threads, values)?,
    };

    if cli.json {
        let report = Report {
            op: cli.op,
            mode: cli.mode,
            threads,
            result,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        match result {
            Value::String(s) => println!("{}", s),
            other => println!("{}", other),
        }
    }

    Ok(())
}

fn run_pooled<P: ThreadPool>(op: Op, threads: usize, values: Vec<i64>) -> Result<Value> {
    let pool = Arc::new(P::new(threads)?);
    let result = execute(&Reducer::with_pool(Arc::clone(&pool)), op, threads, values);
    pool.close();
    result
}

fn execute<P: ThreadPool>(
    reducer: &Reducer<P>,
    op: Op,
    threads: usize,
    values: Vec<i64>,
) -> Result<Value> {
    let is_even = |x: &i64| x % 2 == 0;
    let value = match op {
        Op::Max => json!(reducer.maximum(threads, values, i64::cmp)?),
        Op::Min => json!(reducer.minimum(threads, values, i64::cmp)?),
        Op::Sum => json!(reducer.reduce(threads, values, monoid::sum())?),
        Op::SumSquares => json!(reducer.map_reduce(
            threads,
            values,
            |x: &i64| x * x,
            monoid::sum()
        )?),
        Op::Join => json!(reducer.join(threads, values)?),
        Op::Evens => json!(reducer.filter(threads, values, is_even)?),
        Op::Squares => json!(reducer.map(threads, values, |x: &i64| x * x)?),
        Op::AllEven => json!(reducer.all(threads, values, is_even)?),
        Op::AnyEven => json!(reducer.any(threads, values, is_even)?),
    };
    Ok(value)
}

/// Reads whitespace separated integers from `path`, or stdin when absent.
fn read_values(path: Option<&PathBuf>) -> Result<Vec<i64>> {
    let text = match path {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    text.split_whitespace()
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|e| ParError::StringError(format!("Invalid integer '{}': {}", token, e)))
        })
        .collect()
}
