mod args;
mod output;

use std::io::{self, BufRead};
use std::thread;

use anyhow::{Context, Result};
use mail_verifier::{VerifyOptions, verify_report};
use tracing::Level;

use args::Cli;
use output::OutputRow;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    let mut destinations = cli.destinations.clone();
    if cli.stdin {
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            if !line.trim().is_empty() {
                destinations.push(line);
            }
        }
    }

    if destinations.is_empty() {
        Cli::clap_command().print_help()?;
        println!();
        return Ok(());
    }

    let options = cli.options();
    let rows: Vec<OutputRow> = verify_all(&cli.origin, &destinations, &options, cli.jobs)
        .into_iter()
        .map(|row| row.trimmed(cli.transcript))
        .collect();

    output::write_reports(&rows, &cli)?;

    // codes de sortie : 0 tout accepté, 2 rejet/échec, 1 fatal
    if output::any_unverified(&rows) {
        std::process::exit(2);
    }
    Ok(())
}

fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

/// Runs the verifications on up to `jobs` threads, keeping input order.
fn verify_all(
    origin: &str,
    destinations: &[String],
    options: &VerifyOptions,
    jobs: usize,
) -> Vec<OutputRow> {
    let verify_one = |dest: &String| OutputRow::new(dest, verify_report(origin, dest, options));
    let jobs = jobs.clamp(1, destinations.len().max(1));
    if jobs == 1 {
        return destinations.iter().map(verify_one).collect();
    }

    let chunk = destinations.len().div_ceil(jobs);
    thread::scope(|scope| {
        let handles: Vec<_> = destinations
            .chunks(chunk)
            .map(|batch| scope.spawn(move || batch.iter().map(verify_one).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(rows) => rows,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
