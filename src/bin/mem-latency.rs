use std::process;

use clap::Parser;
use log::error;

use mem_latency::{output, Averaging, Config, CounterSpec, LatencyBench, Suite, MIB};

/// Sweep pointer-chasing probes over growing regions and report the cost per load.
#[derive(Parser, Debug)]
#[command(name = "mem-latency", version)]
struct Options {
    /// Suite to run
    #[arg(value_enum, default_value_t = Suite::Primary)]
    suite: Suite,

    /// Reduced sweep: one window, regions up to 60 MiB
    #[arg(long, default_value_t = false)]
    fast: bool,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Seed for randomised topologies
    #[arg(long)]
    seed: Option<u64>,

    /// Largest region to sweep, in MiB
    #[arg(long = "max-depth-mib", value_name = "MIB", value_parser = parse_mib)]
    max_depth_bytes: Option<usize>,

    /// Statistic reported as the cost
    #[arg(long, value_enum)]
    averaging: Option<Averaging>,

    /// Fail unless a PMU backend binds
    #[arg(long, default_value_t = false)]
    pmu: bool,

    /// Skip environment checks
    #[arg(long, default_value_t = false)]
    no_preflight: bool,

    /// Check every graph is a single cycle before measuring it
    #[arg(long, default_value_t = false)]
    verify: bool,
}

impl Options {
    /// The preset comes first so explicit options always override it.
    fn config(&self) -> Config {
        let mut config = if self.fast {
            Config::fast()
        } else {
            Config::default()
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(bytes) = self.max_depth_bytes {
            config.max_depth_bytes = bytes;
        }
        if let Some(averaging) = self.averaging {
            config.averaging = averaging;
        }
        if self.pmu {
            config.counter_spec = CounterSpec::Pmu;
        }
        if self.no_preflight {
            config.preflight = false;
        }
        if self.verify {
            config.verify = true;
        }
        config
    }
}

fn parse_mib(value: &str) -> Result<usize, String> {
    let mib: usize = value.parse().map_err(|e| format!("{}", e))?;
    mib.checked_mul(MIB)
        .ok_or_else(|| format!("{} MiB does not fit in the address space", mib))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::parse();

    let report = match LatencyBench::with_config(options.config()).run(options.suite) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if options.json {
        match output::to_json_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("failed to serialize report: {}", e);
                process::exit(1);
            }
        }
    } else {
        print!("{}", output::format_report(&report));
    }
}
