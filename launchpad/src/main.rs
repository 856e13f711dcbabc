//! launchpad - Entry Point
//!
//! Runs the deployment pipeline as a long-lived service, or performs a single
//! deployment with `--deploy`.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use launchpad::app::options::AppOptions;
use launchpad::app::run::{deploy_once, run};
use launchpad::deploy::service::CreateDeployment;
use launchpad::errors::PipelineError;
use launchpad::filesys::file::File;
use launchpad::logs::{init_logging, LogOptions};
use launchpad::models::deployment::Trigger;
use launchpad::storage::layout::StorageLayout;
use launchpad::storage::settings::Settings;
use launchpad::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let (settings, layout) = match load_settings(&cli_args).await {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Unable to load settings: {e}");
            std::process::exit(2);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::new(settings, layout);

    // One-shot deployment
    if cli_args.contains_key("deploy") {
        let (Some(repository), Some(commit)) = (cli_args.get("repository"), cli_args.get("commit"))
        else {
            eprintln!("Usage: launchpad --deploy --repository=<id> --commit=<sha> [--branch=<name>]");
            std::process::exit(2);
        };

        let mut request = CreateDeployment::new(repository, commit, Trigger::Manual);
        if let Some(branch) = cli_args.get("branch") {
            request = request.with_branch(branch);
        }

        match deploy_once(options, request).await {
            Ok(record) => match serde_json::to_string_pretty(&record.to_response()) {
                Ok(text) => println!("{text}"),
                Err(e) => error!("Failed to render deployment: {e}"),
            },
            Err(e) => {
                error!("Deployment failed to start: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    // Run the service
    info!("Running launchpad {} with options: {:?}", version.version, options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run launchpad: {e}");
        std::process::exit(1);
    }
}

async fn load_settings(
    cli_args: &HashMap<String, String>,
) -> Result<(Settings, StorageLayout), PipelineError> {
    let default_layout = StorageLayout::default();
    let settings_file = match cli_args.get("settings") {
        Some(path) => File::new(PathBuf::from(path)),
        None => default_layout.settings_file(),
    };

    let settings = if settings_file.exists().await {
        settings_file.read_json::<Settings>().await?
    } else {
        Settings::default()
    };
    settings.validate()?;

    let layout = match &settings.base_dir {
        Some(base_dir) => StorageLayout::new(base_dir),
        None => default_layout,
    };
    Ok((settings, layout))
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
