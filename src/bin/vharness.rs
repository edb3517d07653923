use clap::builder::PossibleValuesParser;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vharness::config::{HarnessConfig, Thresholds};
use vharness::scenario::{Outcome, ScenarioReport, ScenarioRunner};
use vharness::server::{ProcessController, ServerController};
use vharness::suites;

#[derive(Parser, Debug)]
#[command(name = "vharness")]
#[command(about = "Protocol compliance and attack simulation for HTTP servers", long_about = None)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Port for the HTTP/2 over TLS scenarios.
    #[arg(long, default_value_t = 8443)]
    tls_port: u16,

    /// Suite to run; repeat for several. Runs every suite when omitted.
    #[arg(short, long = "suite", value_parser = PossibleValuesParser::new(suites::NAMES))]
    suites: Vec<String>,

    /// Existing resource for probes that need a 200.
    #[arg(long, default_value = "/index.html")]
    resource: String,

    /// Seconds to wait for a TCP or TLS connection.
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,

    /// Seconds to wait for a response or an HTTP/2 event.
    #[arg(long, default_value_t = 5)]
    response_timeout: u64,

    /// Seconds the server allows for a complete request head.
    #[arg(long)]
    header_timeout: Option<u64>,

    #[arg(long)]
    rapid_reset_threshold: Option<u32>,

    #[arg(long)]
    rapid_reset_attempts: Option<u32>,

    #[arg(long)]
    timing_samples: Option<usize>,

    /// Launch this server binary before the run and stop it afterwards.
    #[arg(long)]
    server: Option<PathBuf>,

    /// Argument for the launched server; repeat for several.
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Seconds to wait for the launched server to accept connections.
    #[arg(long, default_value_t = 10)]
    ready_timeout: u64,

    /// Log filter, e.g. `debug` or `vharness::scenario=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Print every step of scenarios that did not pass.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> HarnessConfig {
        let mut thresholds = Thresholds::default();
        if let Some(secs) = self.header_timeout {
            thresholds.header_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = self.rapid_reset_threshold {
            thresholds.rapid_reset_threshold = threshold;
        }
        if let Some(attempts) = self.rapid_reset_attempts {
            thresholds.rapid_reset_attempts = attempts;
        }
        if let Some(samples) = self.timing_samples {
            thresholds.timing_samples = samples;
        }

        HarnessConfig::new(self.host.clone(), self.port)
            .tls_port(self.tls_port)
            .connect_timeout(Duration::from_secs(self.connect_timeout))
            .response_timeout(Duration::from_secs(self.response_timeout))
            .resource(self.resource.clone())
            .thresholds(thresholds)
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli, config: HarnessConfig) -> Vec<ScenarioReport> {
    let names: Vec<&str> = if cli.suites.is_empty() {
        suites::NAMES.to_vec()
    } else {
        cli.suites.iter().map(String::as_str).collect()
    };

    let runner = ScenarioRunner::new(config);
    let mut reports = Vec::new();
    for name in names {
        let cases = suites::by_name(name, runner.config()).unwrap_or_default();
        tracing::info!(suite = name, cases = cases.len(), "running suite");
        for case in &cases {
            let report = runner.run_case(case);
            println!("{}", report);
            if cli.verbose && !report.verdict.is_pass() {
                for step in &report.trail {
                    println!("    {}", step);
                }
            }
            reports.push(report);
        }
    }
    reports
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());
    let config = cli.config();

    let mut controller = cli.server.as_ref().map(|program| {
        ProcessController::new(program, format!("{}:{}", config.host, config.port)).args(cli.server_args.clone())
    });
    let handle = match controller.as_mut() {
        Some(controller) => match controller.start(&[]) {
            Ok(handle) => {
                if !controller.wait_ready(&handle, Duration::from_secs(cli.ready_timeout)) {
                    tracing::error!(port = config.port, "server did not become ready");
                    if let Err(e) = controller.stop(handle) {
                        tracing::error!(error = %e, "failed to stop server");
                    }
                    return ExitCode::from(2);
                }
                Some(handle)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start server");
                return ExitCode::from(2);
            }
        },
        None => None,
    };

    let reports = run(&cli, config);

    if let (Some(controller), Some(handle)) = (controller.as_mut(), handle) {
        if let Err(e) = controller.stop(handle) {
            tracing::error!(error = %e, "failed to stop server");
        }
    }

    let count = |outcome: Outcome| reports.iter().filter(|r| r.verdict.outcome() == outcome).count();
    let failed = count(Outcome::Fail);
    println!(
        "\n{} scenarios: {} passed, {} failed, {} inconclusive",
        reports.len(),
        count(Outcome::Pass),
        failed,
        count(Outcome::Inconclusive)
    );

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
