mod auth;
mod config;
mod dnac;
mod error;
mod inventory;
mod jobs;
mod models;
mod report;
mod rollout;
mod templates;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth::Session;
use config::Config;
use dnac::DnacClient;
use report::CsvReportSink;
use rollout::{PromptGate, RolloutCoordinator, RolloutPlan, RolloutReport, Window};

/// Reconcile a CLI template on DNA Center and roll it out to the inventory
#[derive(Parser)]
#[command(name = "dnac-rollout")]
#[command(version)]
struct Cli {
    /// Template project on the controller
    #[arg(short, long, env = "DNAC_PROJECT")]
    project: Option<String>,

    /// Jinja template file; its name up to the first dot is the template name
    #[arg(short, long, env = "DNAC_TEMPLATE_FILE")]
    template: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the inventory against the configured device types
    Inventory,

    /// Create or update the template and commit it
    Upload,

    /// Deploy the committed template to one device
    Deploy {
        /// Hostname as known to the controller
        #[arg(short, long)]
        device: String,
    },

    /// Deploy to a window of the eligible devices and write a report
    Rollout {
        /// Index of the first eligible device
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Number of devices; all remaining when omitted
        #[arg(long)]
        count: Option<usize>,

        /// CSV report destination
        #[arg(long, env = "DNAC_REPORT_PATH")]
        report: Option<PathBuf>,

        /// Ask before each phase and each device
        #[arg(short, long)]
        interactive: bool,
    },

    /// Delete the template and its project
    Cleanup {
        #[arg(long)]
        keep_project: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dnac_rollout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::load()?;
    if let Some(project) = cli.project {
        cfg.project = project;
    }
    if let Some(template) = cli.template {
        cfg.template_file = template.to_string_lossy().into_owned();
    }
    cfg.validate()?;

    tracing::info!("Controller: {}", cfg.dnac_url);
    tracing::info!("Project: {}", cfg.project);

    let client = Arc::new(DnacClient::from_config(&cfg)?);
    let session = Session::new(client, cfg.credentials.clone());
    let mut coordinator = RolloutCoordinator::new(session, cfg.poll)
        .with_page_size(cfg.page_size)
        .with_conventions(cfg.conventions.clone());

    match cli.command {
        Commands::Inventory => {
            let classified = coordinator.classify(&cfg.device_types).await?;
            for device in &classified.eligible {
                println!("eligible    {:<32} {}", device.hostname, device.device_type);
            }
            for device in &classified.ineligible {
                println!("unreachable {:<32} {}", device.hostname, device.device_type);
            }
            for device in &classified.skipped {
                println!("other type  {:<32} {}", device.hostname, device.device_type);
            }
        }

        Commands::Upload => {
            let template = templates::load_template(&cfg.template_file).await?;
            let id = coordinator.upload(&cfg.project, &template).await?;
            println!("Template '{}' committed: {}", template.name, id);
        }

        Commands::Deploy { device } => {
            let template = templates::load_template(&cfg.template_file).await?;
            let mut sink = CsvReportSink::new(&cfg.report_path);
            let report = coordinator
                .deploy_single(&cfg.project, &template, &device, &cfg.template_values, &mut sink)
                .await?;
            print_summary(&report);
            finish(report)?;
        }

        Commands::Rollout {
            start,
            count,
            report,
            interactive,
        } => {
            if interactive {
                coordinator = coordinator.with_gate(PromptGate);
            }
            let plan = RolloutPlan {
                project: cfg.project.clone(),
                template: templates::load_template(&cfg.template_file).await?,
                allowed_types: cfg.device_types.clone(),
                window: Window::new(start, count.unwrap_or(usize::MAX)),
                values: cfg.template_values.clone(),
            };
            let mut sink = CsvReportSink::new(report.unwrap_or_else(|| PathBuf::from(&cfg.report_path)));

            let report = coordinator.run(&plan, &mut sink).await?;
            print_summary(&report);
            finish(report)?;
        }

        Commands::Cleanup { keep_project } => {
            let template = templates::template_name(std::path::Path::new(&cfg.template_file))?;
            coordinator.cleanup(&cfg.project, &template, keep_project).await?;
        }
    }

    Ok(())
}

fn print_summary(report: &RolloutReport) {
    println!("Run {} (template {})", report.run_id, report.template_id);
    for entry in &report.entries {
        println!(
            "  {:<32} {:<10} {}",
            entry.hostname,
            entry.status.as_str(),
            entry.error.as_deref().unwrap_or("")
        );
    }
    println!(
        "{} succeeded, {} failed, {} of {} processed",
        report.succeeded(),
        report.failed(),
        report.entries.len(),
        report.window.count
    );
}

/// Turn an aborted or failed run into a non-zero exit
fn finish(mut report: RolloutReport) -> anyhow::Result<()> {
    let failed = report.failed();
    if let Some(err) = report.aborted.take() {
        return Err(anyhow::Error::new(err).context("rollout aborted"));
    }
    if report.halted {
        println!("Rollout halted by operator");
    }
    if failed > 0 {
        anyhow::bail!("{} deployments failed", failed);
    }
    Ok(())
}
