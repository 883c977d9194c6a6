use anyhow::Result;
use async_trait::async_trait;
use backend_host::{HostBackend, HostBackendConfig};
use latchkey_config::{ConfigError, LatchkeyConfig, DEFAULT_BACKEND_PROVIDER};
use latchkey_navigator::Navigator;
use latchkey_pipeline::{
    FinalizeHook, LogLevel, PipelineConfig, PipelineDriver, PipelineEvent, PipelinePhase,
    StagePlan,
};
use latchkey_protocol::DeviceBackend;
use latchkey_shell::{LineKind, ShellConfig, ShellProcessor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;

const LOG_FILE_NAME: &str = "latchkey.log";
const RESTART_COMMAND: &str = "launchctl reboot userspace";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli_flags()?;
    let config = match &cli.config {
        Some(path) => latchkey_config::load_from_path(path)?,
        None => latchkey_config::load_from_env()?,
    };
    init_file_logging(config.log.directory.as_str())?;

    let provider = resolve_provider_key(cli.backend.as_deref(), &config.backend_provider);
    let backend = build_backend(&config, &provider)?;
    backend.health_check().await?;
    tracing::info!(provider = provider.as_str(), "latchkey starting");

    if !cli.skip_unlock {
        run_unlock(Arc::clone(&backend), &config).await?;
    }

    match &cli.browse {
        Some(path) => browse_once(backend, path).await,
        None => run_shell(backend, &config).await,
    }
}

/// Drives the staged unlock to completion, mirroring events to stdout, and
/// waits out the post-completion restart delay before handing off to the
/// shell.
async fn run_unlock(backend: Arc<dyn DeviceBackend>, config: &LatchkeyConfig) -> Result<()> {
    let pipeline_config = PipelineConfig {
        event_buffer: config.pipeline.event_buffer,
        finalize_delay: Duration::from_secs(config.pipeline.finalize_delay_secs),
    };
    let driver = PipelineDriver::with_config(
        Arc::clone(&backend),
        StagePlan::standard_unlock(),
        pipeline_config,
    )
    .with_finalize_hook(Arc::new(RestartFinalize { backend }));

    let mut events = driver.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_pipeline_event(&event);
        }
    });

    let run = driver.run().await;
    drop(driver);
    let _ = printer.await;

    if run.snapshot.phase == PipelinePhase::Failed {
        let message = run
            .snapshot
            .failure
            .unwrap_or_else(|| "unlock failed".to_owned());
        anyhow::bail!("unlock failed: {message}");
    }
    if let Some(finalize) = run.finalize {
        println!("Restarting system services...");
        let _ = finalize.await;
    }
    Ok(())
}

fn print_pipeline_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Log(entry) => {
            let marker = match entry.level {
                LogLevel::Info => " ",
                LogLevel::Success => "+",
                LogLevel::Warning => "!",
                LogLevel::Error => "x",
            };
            println!("{} {} {}", entry.timestamp, marker, entry.message);
        }
        PipelineEvent::Progress(fraction) => {
            println!("      {:>3.0}%", fraction * 100.0);
        }
        PipelineEvent::StageStarted { .. }
        | PipelineEvent::StageCompleted { .. }
        | PipelineEvent::RunCompleted
        | PipelineEvent::RunFailed { .. } => {}
    }
}

/// Interactive shell loop over stdin. Ends on EOF or when the session is
/// closed with the exit builtin.
async fn run_shell(backend: Arc<dyn DeviceBackend>, config: &LatchkeyConfig) -> Result<()> {
    let shell_config = ShellConfig {
        home_directory: config.shell.home_directory.clone(),
        history_limit: config.shell.history_limit,
    };
    let mut processor = ShellProcessor::new(backend, shell_config);
    let mut printed = print_new_lines(&processor, 0);
    processor.start().await;
    printed = print_new_lines(&processor, printed);
    if !processor.is_connected() {
        anyhow::bail!("shell session could not be started");
    }

    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    use std::io::Write as _;
    loop {
        print!("{}# ", processor.current_directory());
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let before = processor.lines().len();
        processor.execute(&line).await;
        // A clear builtin shrinks the transcript; restart printing from the
        // top in that case.
        let from = if processor.lines().len() < before { 0 } else { printed };
        printed = print_new_lines(&processor, from);
        if !processor.is_connected() {
            break;
        }
    }
    Ok(())
}

fn print_new_lines(processor: &ShellProcessor, from: usize) -> usize {
    for line in &processor.lines()[from..] {
        match line.kind {
            LineKind::Command => println!("# {}", line.text),
            LineKind::Error => eprintln!("{}", line.text),
            LineKind::Output | LineKind::System => println!("{}", line.text),
        }
    }
    processor.lines().len()
}

/// One-shot directory listing for `--browse <path>`.
async fn browse_once(backend: Arc<dyn DeviceBackend>, path: &str) -> Result<()> {
    let mut navigator = Navigator::new(backend);
    navigator.bootstrap().await;
    if path != "/" {
        navigator.navigate_to(path).await;
    }

    let listing = navigator.listing();
    if let Some(error) = &listing.error {
        anyhow::bail!("{error}: {path}");
    }
    println!("{}", navigator.current_path());
    for entry in &listing.items {
        let marker = if entry.is_directory { "d" } else { "-" };
        println!(
            "{marker} {:<10} {:>10}  {}",
            entry.permissions, entry.size, entry.name
        );
    }
    Ok(())
}

/// Issues the userspace restart over the privilege backend once the unlock
/// settles.
struct RestartFinalize {
    backend: Arc<dyn DeviceBackend>,
}

#[async_trait]
impl FinalizeHook for RestartFinalize {
    async fn finalize(&self) {
        match self.backend.execute_line(RESTART_COMMAND).await {
            Ok(_) => tracing::info!("userspace restart requested"),
            Err(error) => {
                tracing::warn!(error = %error, "userspace restart request failed")
            }
        }
    }
}

fn build_backend(
    config: &LatchkeyConfig,
    provider: &str,
) -> Result<Arc<dyn DeviceBackend>, ConfigError> {
    match provider {
        "backend.host" => {
            let host = &config.backend.host;
            Ok(Arc::new(HostBackend::new(HostBackendConfig {
                shell: PathBuf::from(host.shell.as_str()),
                toolkit: host.toolkit_path(),
                command_timeout: Duration::from_secs(host.command_timeout_secs),
            })))
        }
        other => Err(ConfigError::Message(format!(
            "Unknown backend provider '{other}'. Expected 'backend.host'."
        ))),
    }
}

fn resolve_provider_key(cli: Option<&str>, config_value: &str) -> String {
    let raw = cli.unwrap_or(config_value);
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        DEFAULT_BACKEND_PROVIDER.to_owned()
    } else {
        normalized
    }
}

fn init_file_logging(log_directory: &str) -> Result<(), ConfigError> {
    let directory = Path::new(log_directory);
    std::fs::create_dir_all(directory).map_err(|error| {
        ConfigError::Message(format!(
            "failed to create log directory '{}': {error}",
            directory.display()
        ))
    })?;

    let log_path = directory.join(LOG_FILE_NAME);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|error| {
            ConfigError::Message(format!(
                "failed to open log file '{}': {error}",
                log_path.display()
            ))
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}

#[derive(Debug, Default)]
struct CliFlags {
    backend: Option<String>,
    config: Option<PathBuf>,
    skip_unlock: bool,
    browse: Option<String>,
}

fn parse_cli_flags() -> Result<CliFlags, ConfigError> {
    parse_cli_args(std::env::args().skip(1))
}

fn parse_cli_args(args: impl Iterator<Item = String>) -> Result<CliFlags, ConfigError> {
    let mut flags = CliFlags::default();
    let mut args = args;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--backend" => {
                flags.backend = Some(read_cli_value(
                    &arg,
                    args.next().ok_or_else(|| {
                        ConfigError::Message(
                            "Missing value after --backend. Use --backend <backend.host>."
                                .to_owned(),
                        )
                    })?,
                )?);
            }
            "--config" => {
                flags.config = Some(PathBuf::from(read_cli_value(
                    &arg,
                    args.next().ok_or_else(|| {
                        ConfigError::Message(
                            "Missing value after --config. Use --config <path>.".to_owned(),
                        )
                    })?,
                )?));
            }
            "--browse" => {
                flags.browse = Some(read_cli_value(
                    &arg,
                    args.next().ok_or_else(|| {
                        ConfigError::Message(
                            "Missing value after --browse. Use --browse <path>.".to_owned(),
                        )
                    })?,
                )?);
            }
            "--skip-unlock" => {
                flags.skip_unlock = true;
            }
            "--help" | "-h" => {
                print_cli_help();
                std::process::exit(0);
            }
            value if value.starts_with("--") => {
                return Err(ConfigError::Message(format!(
                    "Unknown flag '{value}'. Run with --help for valid flags."
                )));
            }
            unknown => {
                return Err(ConfigError::Message(format!(
                    "Unexpected argument '{unknown}'. Run with --help for valid flags."
                )));
            }
        }
    }

    Ok(flags)
}

fn print_cli_help() {
    println!("Usage: latchkey [--backend <key>] [--config <path>] [--skip-unlock] [--browse <path>]");
    println!();
    println!("  --backend <key>    Select the privilege backend (backend.host)");
    println!("  --config <path>    Load configuration from <path> instead of the default");
    println!("  --skip-unlock      Skip the unlock pipeline and open the shell directly");
    println!("  --browse <path>    Print one directory listing and exit");
    println!("  --help             Show this help message");
}

fn read_cli_value(flag: &str, value: String) -> Result<String, ConfigError> {
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Err(ConfigError::Message(format!(
            "Flag '{flag}' requires a non-empty value."
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(values: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
        values.iter().map(|value| (*value).to_owned())
    }

    #[test]
    fn cli_flags_parse_all_supported_switches() {
        let flags = parse_cli_args(args(&[
            "--backend",
            "backend.host",
            "--config",
            "custom.toml",
            "--skip-unlock",
            "--browse",
            "/var/mobile",
        ]))
        .expect("parse flags");
        assert_eq!(flags.backend.as_deref(), Some("backend.host"));
        assert_eq!(flags.config.as_deref(), Some(Path::new("custom.toml")));
        assert!(flags.skip_unlock);
        assert_eq!(flags.browse.as_deref(), Some("/var/mobile"));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let error = parse_cli_args(args(&["--verbose"])).expect_err("must reject");
        assert!(error.to_string().contains("--verbose"));
    }

    #[test]
    fn flag_values_must_be_non_empty() {
        let error = parse_cli_args(args(&["--backend", "  "])).expect_err("must reject");
        assert!(error.to_string().contains("--backend"));
    }

    #[test]
    fn provider_key_falls_back_to_config_then_default() {
        assert_eq!(
            resolve_provider_key(Some("Backend.Host"), "ignored"),
            "backend.host"
        );
        assert_eq!(resolve_provider_key(None, "backend.host"), "backend.host");
        assert_eq!(resolve_provider_key(None, "  "), DEFAULT_BACKEND_PROVIDER);
    }

    #[test]
    fn backend_factory_rejects_unknown_provider_keys() {
        let config = LatchkeyConfig::default();
        let error = build_backend(&config, "backend.remote").expect_err("must reject");
        assert!(error.to_string().contains("backend.remote"));
        assert!(error.to_string().contains("backend.host"));
    }

    #[test]
    fn backend_factory_builds_the_host_backend() {
        let config = LatchkeyConfig::default();
        assert!(build_backend(&config, "backend.host").is_ok());
    }
}
