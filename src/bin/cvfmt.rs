//! CLI binary for cv-formatter-client.
//!
//! A thin shim over the library crate: maps flags to `ClientConfig`, renders
//! the form's view effects to the terminal, and drives one
//! `SubmissionController` per invocation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cv_formatter_client::{
    ClientConfig, CredentialStore, FileSource, FormView, KeyStoreCredentials, MemoryCredentials,
    ReqwestTransport, SubmissionController, SubmitOutcome, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Terminal view ────────────────────────────────────────────────────────────

/// Renders form effects as terminal output. The loading state is an
/// indicatif spinner; messages printed while it spins go through the bar so
/// they do not tear the line.
struct TerminalView {
    server: String,
    quiet: bool,
    show_progress: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalView {
    fn new(server: &str, quiet: bool, show_progress: bool) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            quiet,
            show_progress,
            spinner: None,
        }
    }

    fn line(&self, text: String) {
        match self.spinner {
            Some(ref bar) => bar.println(text),
            None => eprintln!("{text}"),
        }
    }
}

impl FormView for TerminalView {
    // The key is never echoed.
    fn set_credential(&mut self, _value: &str) {}

    fn set_remember(&mut self, on: bool) {
        tracing::debug!(remember = on, "Remember toggle");
    }

    fn set_clear_visible(&mut self, _visible: bool) {}

    fn show_file(&mut self, name: &str) {
        if !self.quiet {
            self.line(format!("{} {}", cyan("◆"), bold(name)));
        }
    }

    fn set_loading(&mut self, loading: bool) {
        if loading {
            if !self.show_progress {
                return;
            }
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_prefix("Formatting");
            bar.set_message("uploading and waiting for the server…");
            bar.enable_steady_tick(Duration::from_millis(80));
            self.spinner = Some(bar);
        } else if let Some(bar) = self.spinner.take() {
            bar.finish_and_clear();
        }
    }

    fn show_error(&mut self, message: &str) {
        self.line(format!("{} {}", red("✘"), red(message)));
    }

    fn show_success(&mut self, message: &str) {
        if !self.quiet {
            self.line(format!("{} {}", green("✔"), message));
        }
    }

    fn hide_messages(&mut self) {}

    fn set_download_visible(&mut self, filename: Option<&str>) {
        if let (Some(name), false) = (filename, self.quiet) {
            self.line(format!("  {} {}", dim("ready:"), bold(name)));
        }
    }

    fn navigate(&mut self, path: &str) {
        self.line(format!(
            "{} Session ended. Log in again at {}{}",
            cyan("→"),
            self.server,
            path
        ));
    }
}

// ── CLI ──────────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Format a resume (saved into the current directory)
  cvfmt submit resume.pdf --api-key sk-...

  # Remember the key for next time, save into ./out
  cvfmt submit resume.pdf --api-key sk-... --remember -o out

  # Use the remembered key; ask before saving
  cvfmt submit resume.pdf --no-auto-download

  # Forget the remembered key
  cvfmt forget

  # Talk to a deployed server with an existing session
  cvfmt --server https://cv.example.com --session "session=..." submit resume.pdf

ENVIRONMENT VARIABLES:
  CVFMT_SERVER       Server base URL (default http://localhost:5000)
  CVFMT_SESSION      Session cookie sent with every request (name=value)
  CVFMT_API_KEY      API key for `submit`
  CVFMT_OUTPUT_DIR   Directory results are saved into
  KEYSTORE_DIR       Where the remembered key is stored (default: platform config dir)

LIMITS:
  PDF only (by type or .pdf suffix), at most 10 MB.
"#;

/// Format PDF resumes through a CV-formatter server.
#[derive(Parser, Debug)]
#[command(
    name = "cvfmt",
    version,
    about = "Format PDF resumes through a CV-formatter server",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Server base URL.
    #[arg(long, global = true, env = "CVFMT_SERVER", default_value = "http://localhost:5000")]
    server: String,

    /// Session cookie (name=value) sent with every request.
    #[arg(long, global = true, env = "CVFMT_SESSION", hide_env_values = true)]
    session: Option<String>,

    /// Whole-request timeout in seconds (default: none).
    #[arg(long, global = true, env = "CVFMT_TIMEOUT")]
    timeout: Option<u64>,

    /// Disable the spinner.
    #[arg(long, global = true, env = "CVFMT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CVFMT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CVFMT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF and save the formatted document.
    Submit {
        /// PDF resume to format.
        pdf: PathBuf,

        /// API key passed through to the server. Defaults to the remembered key.
        #[arg(long, env = "CVFMT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Remember the API key for later runs.
        #[arg(long)]
        remember: bool,

        /// Forget any remembered API key.
        #[arg(long, conflicts_with = "remember")]
        forget_key: bool,

        /// Ask before saving instead of saving right away.
        #[arg(long)]
        no_auto_download: bool,

        /// Directory the result is saved into.
        #[arg(short, long, env = "CVFMT_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,
    },

    /// Remember an API key without submitting anything.
    Remember {
        /// API key to store.
        key: String,
    },

    /// Forget the remembered API key.
    Forget,

    /// End the server session.
    Logout,

    /// Check that the server is up.
    Health,
}

type Form = SubmissionController<ReqwestTransport, TerminalView>;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep library logs down to warnings by default; the view already tells
    // the user everything that matters.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Submit {
            ref pdf,
            ref api_key,
            remember,
            forget_key,
            no_auto_download,
            ref output_dir,
        } => {
            let config = base_config(&cli)
                .auto_download(!no_auto_download)
                .output_dir(output_dir)
                .build()
                .context("Invalid configuration")?;
            let mut form = build_form(&cli, config)?;
            form.initialize();
            if forget_key {
                form.clear_credential();
            }
            if let Some(ref key) = api_key {
                form.input_credential(key);
            }
            if remember {
                form.set_remember(true);
            }

            let file = UploadedFile::from_path(pdf)
                .await
                .with_context(|| format!("Failed to load {}", pdf.display()))?;
            if form.select_file(file, FileSource::Picker).is_err() {
                form.settle().await;
                return Ok(ExitCode::FAILURE);
            }

            let code = match form.submit().await {
                SubmitOutcome::Downloaded { path, .. } => {
                    println!("{}", path.display());
                    ExitCode::SUCCESS
                }
                SubmitOutcome::Ready { filename } => {
                    if confirm(&format!("Save {filename}?")).await? {
                        match form.download().await {
                            Ok(path) => {
                                println!("{}", path.display());
                                ExitCode::SUCCESS
                            }
                            Err(_) => ExitCode::FAILURE,
                        }
                    } else {
                        if !cli.quiet {
                            eprintln!("{}", dim("Discarded."));
                        }
                        ExitCode::SUCCESS
                    }
                }
                SubmitOutcome::Redirected { .. } => {
                    eprintln!(
                        "{} Session expired. Pass a fresh session cookie with --session.",
                        red("✘")
                    );
                    ExitCode::from(2)
                }
                SubmitOutcome::Failed(_) => ExitCode::FAILURE,
            };
            form.settle().await;
            Ok(code)
        }

        Command::Remember { ref key } => {
            let config = base_config(&cli).build().context("Invalid configuration")?;
            let mut form = build_form(&cli, config)?;
            form.initialize();
            form.set_remember(true);
            form.input_credential(key);
            form.settle().await;
            if !cli.quiet {
                eprintln!("{} API key remembered", green("✔"));
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Forget => {
            let config = base_config(&cli).build().context("Invalid configuration")?;
            let mut form = build_form(&cli, config)?;
            form.clear_credential();
            if !cli.quiet {
                eprintln!("{} Remembered API key cleared", green("✔"));
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Logout => {
            let config = base_config(&cli).build().context("Invalid configuration")?;
            let mut form = build_form(&cli, config)?;
            form.logout().await;
            Ok(ExitCode::SUCCESS)
        }

        Command::Health => {
            let config = base_config(&cli).build().context("Invalid configuration")?;
            let form = build_form(&cli, config)?;
            let healthy = form.health().await.context("Health check failed")?;
            if healthy {
                println!("ok");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("unhealthy");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Map global flags onto the config builder.
fn base_config(cli: &Cli) -> cv_formatter_client::ClientConfigBuilder {
    let mut builder = ClientConfig::builder().base_url(&cli.server);
    if let Some(ref cookie) = cli.session {
        builder = builder.session_cookie(cookie);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    builder
}

fn build_form(cli: &Cli, config: ClientConfig) -> Result<Form> {
    let transport = ReqwestTransport::new(&config).context("Failed to set up HTTP client")?;
    let show_progress = !cli.quiet && !cli.no_progress && io::stderr().is_terminal();
    let view = TerminalView::new(&config.base_url, cli.quiet, show_progress);
    Ok(SubmissionController::new(config, transport, open_store(), view))
}

/// The on-disk store, or a throwaway one when it cannot be opened: a key
/// that cannot be remembered must not block a submission.
fn open_store() -> Arc<dyn CredentialStore> {
    match KeyStoreCredentials::open() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Could not open credential store, key will not be remembered: {e}");
            Arc::new(MemoryCredentials::new())
        }
    }
}

/// Ask a yes/no question on the terminal. Defaults to yes; non-interactive
/// stdin answers yes.
async fn confirm(question: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(true);
    }
    let question = question.to_string();
    tokio::task::spawn_blocking(move || -> Result<bool> {
        eprint!("{question} [Y/n] ");
        io::stderr().flush().ok();
        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Failed to read answer")?;
        let answer = answer.trim().to_lowercase();
        Ok(answer.is_empty() || answer == "y" || answer == "yes")
    })
    .await
    .context("Prompt task failed")?
}
