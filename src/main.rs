use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::str::FromStr;

use flowrisk::config::StressTestConfig;
use flowrisk::error::FlowRiskError;
use flowrisk::metrics::{self, Spread};
use flowrisk::run::{self, StressTestReport};
use tracing_subscriber::EnvFilter;

struct Args {
    input: Option<String>,
    seed: Option<u64>,
    horizon: Option<u32>,
    sims: Option<u32>,
    output: String,
    csv: Option<String>,
    runs: Option<u64>,
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match parse_args(std::env::args().skip(1)).and_then(|args| execute(&args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Args, FlowRiskError> {
    let mut args = Args {
        input: None,
        seed: None,
        horizon: None,
        sims: None,
        output: "report.json".to_string(),
        csv: None,
        runs: None,
        quiet: false,
    };

    while let Some(flag) = argv.next() {
        match flag.as_str() {
            "--input" => args.input = Some(value(&flag, argv.next())?),
            "--seed" => args.seed = Some(number(&flag, argv.next())?),
            "--horizon" => args.horizon = Some(number(&flag, argv.next())?),
            "--sims" => args.sims = Some(number(&flag, argv.next())?),
            "--output" => args.output = value(&flag, argv.next())?,
            "--csv" => args.csv = Some(value(&flag, argv.next())?),
            "--runs" => args.runs = Some(number(&flag, argv.next())?),
            "--quiet" => args.quiet = true,
            _ => return Err(FlowRiskError::InvalidParameter { key: flag.clone(), reason: "unknown flag" }),
        }
    }
    Ok(args)
}

fn value(flag: &str, next: Option<String>) -> Result<String, FlowRiskError> {
    next.ok_or_else(|| FlowRiskError::InvalidParameter { key: flag.to_string(), reason: "missing value" })
}

fn number<T: FromStr>(flag: &str, next: Option<String>) -> Result<T, FlowRiskError> {
    value(flag, next)?.parse().map_err(|_| FlowRiskError::InvalidParameter {
        key: flag.to_string(),
        reason: "expected a non-negative integer",
    })
}

fn execute(args: &Args) -> Result<(), FlowRiskError> {
    let mut config = match &args.input {
        Some(path) => StressTestConfig::from_json_file(path)?,
        None => StressTestConfig::canonical(),
    };
    if let Some(h) = args.horizon {
        config.run.horizon_months = h;
    }
    if let Some(n) = args.sims {
        config.run.n_sims = n;
    }
    if let Some(s) = args.seed {
        config.run.seed = Some(s);
    }

    match args.runs {
        Some(n) => sweep(config, n, args),
        None => single(&config, args),
    }
}

fn single(config: &StressTestConfig, args: &Args) -> Result<(), FlowRiskError> {
    let report = run::execute(config)?;

    let mut writer = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writeln!(writer)?;

    if !args.quiet {
        print_report(&report);
        println!("\nReport written to {}", args.output);
    }
    Ok(())
}

/// Re-run the same household across consecutive seeds to see how stable the
/// failure probability is.
fn sweep(config: StressTestConfig, n: u64, args: &Args) -> Result<(), FlowRiskError> {
    use rayon::prelude::*;

    let start_seed = config.run.seed.unwrap_or_else(run::generate_seed);

    let reports: Vec<StressTestReport> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut cfg = config.clone();
            cfg.run.seed = Some(start_seed.wrapping_add(i));
            run::execute(&cfg)
        })
        .collect::<Result<Vec<_>, FlowRiskError>>()?;

    if let Some(path) = &args.csv {
        write_runs_csv(&reports, path)?;
    }

    if !args.quiet {
        print_runs(&reports);
        let p_fails: Vec<f64> = reports.iter().map(|r| r.summary.p_fail).collect();
        match metrics::spread(&p_fails) {
            Some(s) if s.n >= 2 => print_spread(&s),
            _ => eprintln!("Warning: Distribution requires >= 2 runs"),
        }
    }
    Ok(())
}

fn print_report(report: &StressTestReport) {
    let run = &report.run;
    let s = &report.summary;

    println!("=== Stress test ===");
    println!(
        "  scenario: {}   horizon: {} months   sims: {}   seed: {}",
        run.scenario.map(|k| k.as_str()).unwrap_or("none"),
        run.horizon_months,
        run.n_sims,
        run.seed
    );
    println!(
        "  sigma_income: {:.3}   sigma_variable: {:.3}",
        run.assumptions.sigma_income, run.assumptions.sigma_variable
    );

    println!("\n=== Summary ===");
    println!("  P(fail):            {:>6.2}%  ({} of {})", s.p_fail * 100.0, s.n_failed, s.n_sims);
    match &s.time_to_fail {
        Some(t) => println!("  Months to fail:     p10 {:.1} | p50 {:.1} | p90 {:.1}", t.p10, t.p50, t.p90),
        None => println!("  Months to fail:     no failures"),
    }
    println!(
        "  Min cash:           p10 {:.2} | p50 {:.2} | p90 {:.2}",
        s.min_cash.p10, s.min_cash.p50, s.min_cash.p90
    );
    println!("  Avg debt payment:   {:.2}", s.avg_debt_payment);

    let c = &report.chart;
    println!("\n=== Cash by month ===");
    println!("{:>5} | {:>12} | {:>12} | {:>12}", "Month", "p10", "p50", "p90");
    println!("{}", "-".repeat(5 + 3 + 12 + 3 + 12 + 3 + 12));
    for (i, m) in c.months.iter().enumerate() {
        println!("{:>5} | {:>12.2} | {:>12.2} | {:>12.2}", m, c.cash_p10[i], c.cash_p50[i], c.cash_p90[i]);
    }

    println!("\n=== Risk drivers ===");
    println!("{:>24} | {:>10}", "Driver", "ΔP(fail)");
    println!("{}", "-".repeat(24 + 3 + 10));
    for d in &report.drivers {
        println!("{:>24} | {:>+10.4}", d.label, d.delta_p_fail);
    }
}

fn print_runs(reports: &[StressTestReport]) {
    println!("\n=== Per-Run Results ===");
    println!("{:>10} | {:>8} | {:>8} | {:>12} | {:>12}", "Seed", "P(fail)%", "Failed#", "MinCash p10", "MinCash p50");
    println!("{}", "-".repeat(60));
    for r in reports {
        println!(
            "{:>10} | {:>7.2}% | {:>8} | {:>12.2} | {:>12.2}",
            r.run.seed,
            r.summary.p_fail * 100.0,
            r.summary.n_failed,
            r.summary.min_cash.p10,
            r.summary.min_cash.p50,
        );
    }
}

fn print_spread(s: &Spread) {
    println!("\n=== Multi-Run Distribution (N={} runs) ===", s.n);
    println!("{:>8} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7}", "", "min", "p10", "p50", "p90", "max");
    println!(
        "{:>8} | {:>7.2} | {:>7.2} | {:>7.2} | {:>7.2} | {:>7.2}",
        "P(fail)%",
        s.min * 100.0,
        s.p10 * 100.0,
        s.p50 * 100.0,
        s.p90 * 100.0,
        s.max * 100.0,
    );
}

fn write_runs_csv(reports: &[StressTestReport], path: &str) -> Result<(), FlowRiskError> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "seed,p_fail,n_failed,min_cash_p10,min_cash_p50,min_cash_p90,avg_debt_payment")?;
    for r in reports {
        let s = &r.summary;
        writeln!(
            w,
            "{},{:.4},{},{:.2},{:.2},{:.2},{:.2}",
            r.run.seed, s.p_fail, s.n_failed, s.min_cash.p10, s.min_cash.p50, s.min_cash.p90, s.avg_debt_payment,
        )?;
    }
    Ok(())
}
