use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use falcon_client::api::{HttpServiceClient, JobStatus, ServiceApi};
use falcon_client::artifacts::{cell_text, ArtifactSet, Preview};
use falcon_client::asset::AssetRef;
use falcon_client::config::{AppConfig, AppPaths};
use falcon_client::session::{SessionController, SessionMetadata, SessionView, Stage};

#[derive(Debug, Parser)]
#[command(name = "falcon", about = "Submit call recordings and scripts for Falcon analysis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to the per-user settings.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Service base URL, overrides the settings file
    #[arg(long, global = true, env = "FALCON_BASE_URL")]
    pub base_url: Option<String>,

    /// Status polling interval in milliseconds
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload an asset, wait for processing and print the results
    Run {
        /// Call recording (.mp3, .wav, .m4a) or script (.docx)
        asset: PathBuf,

        #[arg(long)]
        project_id: Option<String>,

        #[arg(long)]
        project_name: Option<String>,

        #[arg(long)]
        agent_name: Option<String>,
    },

    /// Check that the service is reachable
    Health,

    /// List generated files with their download links
    Outputs,

    /// List uploaded files
    Uploads,

    /// Print the effective settings, or write them with --init
    Config {
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.effective_config()?;

        match self.command {
            Commands::Run {
                asset,
                project_id,
                project_name,
                agent_name,
            } => {
                let defaults = &config.defaults;
                let metadata = SessionMetadata::new(
                    project_id.or_else(|| defaults.project_id.clone()).unwrap_or_default(),
                    project_name.or_else(|| defaults.project_name.clone()).unwrap_or_default(),
                    agent_name.or_else(|| defaults.agent_name.clone()).unwrap_or_default(),
                );
                run_session(&config, asset, metadata).await
            }
            Commands::Health => {
                let api = connect(&config)?;
                api.health()
                    .await
                    .with_context(|| format!("service at {} is not healthy", api.base_url()))?;
                println!("{} is healthy", api.base_url());
                Ok(())
            }
            Commands::Outputs => {
                let api = connect(&config)?;
                for file in api.list_outputs().await? {
                    println!("{file}\t{}", api.download_url(&file));
                }
                Ok(())
            }
            Commands::Uploads => {
                let api = connect(&config)?;
                for file in api.list_uploads().await? {
                    println!("{file}");
                }
                Ok(())
            }
            Commands::Config { init } => match (init, self.config) {
                (false, custom) => {
                    if custom.is_none() && AppConfig::is_first_run() {
                        println!("# no settings file yet, showing defaults");
                    }
                    print!("{}", toml::to_string_pretty(&config)?);
                    Ok(())
                }
                (true, Some(path)) => {
                    if path.exists() {
                        bail!("{} already exists", path.display());
                    }
                    config.save_to(&path)?;
                    println!("wrote {}", path.display());
                    Ok(())
                }
                (true, None) => {
                    let path = AppPaths::new().settings_file;
                    if !AppConfig::is_first_run() {
                        bail!("{} already exists", path.display());
                    }
                    config.save()?;
                    println!("wrote {}", path.display());
                    Ok(())
                }
            },
        }
    }

    fn effective_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => AppConfig::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config ({e}); using defaults");
                AppConfig::default()
            }),
        };

        if let Some(url) = &self.base_url {
            config.service.base_url = url.clone();
        }
        if let Some(ms) = self.interval_ms {
            config.polling.interval_ms = ms;
        }
        Ok(config)
    }
}

fn connect(config: &AppConfig) -> Result<HttpServiceClient> {
    Ok(HttpServiceClient::from_config(&config.service)?)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn run_session(config: &AppConfig, path: PathBuf, metadata: SessionMetadata) -> Result<()> {
    let api: Arc<dyn ServiceApi> = Arc::new(connect(config)?);
    let asset = AssetRef::from_path(&path).await?;

    let mut session = SessionController::new(api, &config.polling);
    let progress = spawn_progress(session.subscribe());

    session.set_metadata(metadata)?;
    session.select_asset(asset)?;
    let task_id = session.submit().await?;
    log::info!("job {task_id} submitted");

    let outcome = session.wait_for_outcome().await;
    progress.abort();
    let artifacts = outcome?;

    if let Some(job) = session.state().job() {
        if let Some(summary) = job_summary(job.status()) {
            println!("{summary}");
        }
    }
    print!("{}", render_result(&artifacts));
    Ok(())
}

/// Print a progress line whenever the displayed step changes.
fn spawn_progress(mut view: watch::Receiver<SessionView>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = String::new();
        while view.changed().await.is_ok() {
            let line = progress_line(&view.borrow_and_update());
            if !line.is_empty() && line != last {
                eprintln!("{line}");
                last = line;
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn progress_line(view: &SessionView) -> String {
    match view.stage {
        Stage::Intake => view.notice.clone().unwrap_or_default(),
        Stage::Processing => {
            if let Some(failure) = &view.failure {
                return format!("failed: {failure}");
            }
            let line = format!("[{:>3}%] {}", view.progress.percent(), view.progress.label);
            match &view.notice {
                Some(notice) => format!("{line} ({notice})"),
                None => line,
            }
        }
        Stage::Result => format!("[100%] {}", view.progress.label),
    }
}

fn job_summary(status: &JobStatus) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(secs) = status.duration {
        parts.push(format!("recording {secs:.1} s"));
    }
    if let Some(secs) = status.total_time {
        parts.push(format!("processed in {secs:.1} s"));
    }
    if let Some(cost) = status.cost {
        parts.push(format!("cost {cost:.2}"));
    }
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn render_result(artifacts: &ArtifactSet) -> String {
    let mut out = String::new();

    if artifacts.is_empty() {
        out.push_str("No artifacts were produced for this job.\n");
        return out;
    }

    if let Some(text) = artifacts.narrative_preview() {
        out.push_str("== Report ==\n");
        out.push_str(text.trim_end());
        out.push_str("\n\n");
    }

    if let Some(table) = artifacts.tabular_preview() {
        out.push_str("== Assessment ==\n");
        out.push_str(&render_table(table));
        out.push('\n');
    }

    out.push_str("== Downloads ==\n");
    for artifact in artifacts.iter() {
        out.push_str(&format!("{}  {}\n", artifact.name, artifact.download_url));
    }
    out
}

/// Plain-text table with columns taken from the first row.
fn render_table(preview: &Preview) -> String {
    let columns = preview.columns();
    let rows = preview.as_rows().unwrap_or_default();
    if columns.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(*c).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    let mut out = table_line(&columns, &widths);
    out.push_str(&table_line(&rule, &widths));
    for row in &cells {
        out.push_str(&table_line(row, &widths));
    }
    out
}

fn table_line<S: AsRef<str>>(values: &[S], widths: &[usize]) -> String {
    let padded: Vec<String> = values
        .iter()
        .zip(widths)
        .map(|(v, &w)| format!("{:<w$}", v.as_ref()))
        .collect();
    format!("{}\n", padded.join(" | ").trim_end())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
