use anyhow::Context;
use breathcore::pipeline::PassOutcome;
use breathcore::CountingPolicy;
use clap::{Parser, ValueEnum};
use gui_bridge::bridge::{default_bind_address, GuiBridge};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::alert_log::FileAlertLog;
use workflow::config::{WorkflowConfig, WorkflowOverrides};
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    MinCount,
    Paired,
}

impl From<PolicyArg> for CountingPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::MinCount => CountingPolicy::MinCount,
            PolicyArg::Paired => CountingPolicy::PairedAmplitude,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Respiratory-rate pipeline driver")]
struct Args {
    /// Run a single pass over a generated recording and print the result
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long)]
    sample_rate: Option<f64>,
    #[arg(long)]
    window_seconds: Option<f64>,
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
    /// Fire passes on a timer instead of on new-sample count
    #[arg(long)]
    periodic_ms: Option<u64>,
    /// Seconds of synthetic data to produce
    #[arg(long)]
    duration: Option<f64>,
    #[arg(long)]
    breaths_per_minute: Option<f64>,
    /// Stop breathing after this many seconds
    #[arg(long)]
    apnea_after: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    alert_log: Option<PathBuf>,
    /// Live replay speed; 0 pushes samples as fast as possible
    #[arg(long)]
    speed: Option<f64>,
    /// Expose the HTTP bridge while the live pipeline runs
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long)]
    bind: Option<SocketAddr>,
}

impl Args {
    fn overrides(&self) -> WorkflowOverrides {
        WorkflowOverrides {
            sample_rate_hz: self.sample_rate,
            window_seconds: self.window_seconds,
            policy: self.policy.map(CountingPolicy::from),
            periodic_ms: self.periodic_ms,
            duration_s: self.duration,
            breaths_per_minute: self.breaths_per_minute,
            apnea_after_s: self.apnea_after,
            seed: self.seed,
            alert_log: self.alert_log.clone(),
            speed: self.speed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match &args.workflow {
        Some(path) => {
            let mut config = WorkflowConfig::load(path)?;
            config.apply(&args.overrides());
            config.validate().context("validating command-line overrides")?;
            config
        }
        None => WorkflowConfig::from_args(&args.overrides())?,
    };
    let runner = Runner::new(workflow_config);

    if args.offline {
        let alert_log = FileAlertLog::open(&runner.config().alert_log)?;
        let report = runner.execute(&alert_log)?;
        match &report.outcome {
            PassOutcome::Measured(m) => println!(
                "Offline run -> breaths {}, rate {:.1}/min, interval rate {}, spectral rate {}, alerts {}",
                m.breath_count,
                m.breath_rate,
                format_rate(m.interval_rate_bpm),
                format_rate(m.spectral_rate_bpm),
                report.alerts.len()
            ),
            PassOutcome::InsufficientData {
                available,
                required,
            } => println!(
                "Offline run -> insufficient data: {} samples, {} required",
                available, required
            ),
        }
        if !report.alerts.is_empty() {
            println!("Alerts appended to {}", alert_log.path().display());
        }
        runner.archive(&report)?;
        return Ok(());
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;
    runtime.block_on(async {
        let session = runner.start_live(None)?;
        let server = args.serve.then(|| {
            GuiBridge::new(session.controller.clone(), session.latest.clone())
                .serve(args.bind.unwrap_or_else(default_bind_address))
        });

        let summary = session
            .finish(async {
                if let Err(err) = signal::ctrl_c().await {
                    log::error!("awaiting Ctrl+C: {}", err);
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        if let Some(server) = server {
            server.abort();
        }

        let last = summary.last_report.as_ref();
        println!(
            "Live run -> samples {}, passes {}, insufficient {}, skipped {}, alerts {}, last rate {}",
            summary.samples,
            summary.metrics.published,
            summary.metrics.insufficient,
            summary.metrics.skipped,
            summary.metrics.alerts,
            format_rate(last.and_then(|r| r.breath_rate()))
        );
        Ok::<(), anyhow::Error>(())
    })
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "n/a".to_string(), |bpm| format!("{:.1}/min", bpm))
}
