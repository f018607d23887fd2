//! WCAG Audit command-line entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use wcag_audit::browser::find_chromium;
use wcag_audit::{AuditConfig, AuditRequest, RenderMode, RuleOptions, DEFAULT_RUN_ONLY};
use wcag_audit_server::summary::{self, DEFAULT_EXPORT_FILE};
use wcag_audit_server::{build_auditor, rule_engine, AppState};
use wcag_rules::NativeEngine;

#[derive(Parser)]
#[command(
    name = "wcag-audit",
    about = "WCAG accessibility audits over HTTP or from the command line",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of `WCAG_AUDIT_*` environment configuration.
#[derive(Args, Clone, Default)]
struct EngineArgs {
    /// Script payload injected into rendered pages (e.g. axe.min.js).
    #[arg(long)]
    engine_script: Option<PathBuf>,

    /// Global installed by the script payload.
    #[arg(long)]
    engine_global: Option<String>,

    /// Chromium executable for dynamic audits.
    #[arg(long)]
    chromium: Option<PathBuf>,

    /// Navigation budget for dynamic audits, in milliseconds.
    #[arg(long)]
    navigation_timeout_ms: Option<u64>,
}

impl EngineArgs {
    fn config(&self) -> anyhow::Result<AuditConfig> {
        let mut config = AuditConfig::from_env()?;
        if let Some(path) = &self.engine_script {
            config.engine_script = Some(path.clone());
        }
        if let Some(global) = &self.engine_global {
            config.engine_global = global.clone();
        }
        if let Some(path) = &self.chromium {
            config.chromium_path = Some(path.clone());
        }
        if let Some(ms) = self.navigation_timeout_ms.filter(|ms| *ms > 0) {
            config.navigation_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP audit API.
    Serve {
        /// Listen address (host:port).
        #[arg(long, env = "WCAG_AUDIT_ADDR", default_value = "127.0.0.1:3000")]
        addr: SocketAddr,

        /// Refuse dynamic audits instead of launching Chromium.
        #[arg(long)]
        no_browser: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Audit a URL or a local HTML file and print a summary.
    ///
    /// Examples:
    ///   wcag-audit audit https://example.com
    ///   wcag-audit audit https://example.com --dynamic --export
    ///   wcag-audit audit page.html --base-url https://example.com/docs/
    Audit {
        /// http(s) URL or path to an HTML file.
        target: String,

        /// Render the URL in headless Chromium before auditing.
        #[arg(long)]
        dynamic: bool,

        /// Base URL for relative references in a local file.
        #[arg(long)]
        base_url: Option<String>,

        /// Rule tags or ids to run (comma-separated).
        #[arg(long, value_delimiter = ',')]
        run_only: Vec<String>,

        /// Print the raw report JSON instead of the summary.
        #[arg(long)]
        json: bool,

        /// Write the raw report to a file.
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_EXPORT_FILE)]
        export: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Check Chromium and rule engine availability.
    Doctor {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   wcag-audit completions bash > ~/.local/share/bash-completion/completions/wcag-audit
    ///   wcag-audit completions zsh > ~/.zfunc/_wcag-audit
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    match cli.command {
        Commands::Serve {
            addr,
            no_browser,
            engine,
        } => {
            let auditor = build_auditor(engine.config()?, !no_browser)?;
            let state = AppState::new(auditor);
            match &state.chromium {
                Some(path) => tracing::info!("Chromium: {}", path.display()),
                None if !no_browser => {
                    tracing::warn!("Chromium not found; dynamic audits will fail")
                }
                None => {}
            }
            wcag_audit_server::serve(addr, state, shutdown_signal()).await?;
        }

        Commands::Audit {
            target,
            dynamic,
            base_url,
            run_only,
            json,
            export,
            engine,
        } => {
            let options = if run_only.is_empty() {
                RuleOptions::default()
            } else {
                RuleOptions::with_tags(run_only)?
            };

            let request = if target.starts_with("http://") || target.starts_with("https://") {
                let mode = if dynamic {
                    RenderMode::Dynamic
                } else {
                    RenderMode::Static
                };
                AuditRequest::for_url(&target, mode, options)?
            } else {
                let markup = std::fs::read_to_string(&target)
                    .with_context(|| format!("failed to read {target}"))?;
                AuditRequest::for_html(markup, base_url.as_deref(), options)?
            };

            let auditor = build_auditor(engine.config()?, true)?;
            let report = auditor.execute(request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", summary::render(&report));
            }
            if let Some(path) = export {
                summary::export(&report, &path)?;
                eprintln!("Report written to {}", path.display());
            }
        }

        Commands::Doctor { engine } => {
            let config = engine.config()?;

            match find_chromium(config.chromium_path.as_deref()) {
                Some(path) => println!("chromium:      {}", path.display()),
                None => println!(
                    "chromium:      not found (set WCAG_AUDIT_CHROMIUM_PATH or --chromium)"
                ),
            }

            match &config.engine_script {
                Some(path) => match rule_engine(&config) {
                    Ok(_) => println!(
                        "script engine: {} (global '{}')",
                        path.display(),
                        config.engine_global
                    ),
                    Err(e) => println!("script engine: {e}"),
                },
                None => println!("script engine: none (native rules used for rendered pages)"),
            }

            let native = NativeEngine::new();
            println!(
                "native rules:  {} ({})",
                native.rule_ids().len(),
                native.rule_ids().join(", ")
            );
            println!("static audits: native rules only; the script engine runs on rendered pages");
            println!("default tags:  {}", DEFAULT_RUN_ONLY.join(", "));
            println!(
                "budgets:       launch {}ms, navigation {}ms, evaluation {}ms",
                config.launch_timeout.as_millis(),
                config.navigation_timeout.as_millis(),
                config.evaluation_timeout.as_millis()
            );
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "wcag-audit", &mut std::io::stdout());
        }
    }

    Ok(())
}
