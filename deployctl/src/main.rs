//! deployctl - Entry Point
//!
//! Deploys a local directory and follows it until it is live.
//!
//! ```text
//! deployctl [--path=DIR] [--name=NAME] [--project=ID] [--prod]
//!           [--include=GLOB,..] [--exclude=GLOB,..] [--follow-logs] [--timeout=SECS]
//! deployctl --logs=ID [--follow]
//! deployctl --inspect=ID [--wait] [--timeout=SECS]
//! deployctl --version
//! ```

use std::collections::HashMap;
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use deployctl::app::options::AppOptions;
use deployctl::build_logs::printer::print_entry;
use deployctl::build_logs::BuildLogSubscriber;
use deployctl::deploy::api::{DeploymentApi, LogQuery};
use deployctl::deploy::inspect::{wait_for_ready, DEFAULT_POLL_INTERVAL};
use deployctl::deploy::{process_deployment, DeployContext, DeploymentOutcome, DeploymentRequest};
use deployctl::errors::ClientError;
use deployctl::files::ContentMap;
use deployctl::http::HttpClient;
use deployctl::logs::{init_logging, LogOptions};
use deployctl::status::ConsoleStatus;
use deployctl::storage::layout::StorageLayout;
use deployctl::storage::settings::Settings;
use deployctl::utils::{format_bytes, version_info, with_deadline};

use deploy_api::{LogEntry, Target};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Environment variable holding the API token
const TOKEN_ENV: &str = "DEPLOYCTL_TOKEN";

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
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("{}", e),
        }
        return;
    }

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings = match Settings::load(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.log_json,
        log_dir: settings.log_dir.as_ref().map(PathBuf::from),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let code = match run(&cli_args, &settings).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            1
        }
    };
    drop(_log_guard);
    std::process::exit(code);
}

async fn run(cli_args: &HashMap<String, String>, settings: &Settings) -> Result<i32, ClientError> {
    let mut options = AppOptions::from_settings(settings, std::io::stderr().is_terminal());
    options.timeout = match cli_args.get("timeout") {
        Some(secs) => Some(Duration::from_secs(secs.parse().map_err(|_| {
            ClientError::ConfigError(format!("invalid --timeout: {}", secs))
        })?)),
        None => None,
    };
    if cli_args.contains_key("follow-logs") {
        options.process.follow_logs = true;
    }

    let token = env::var(TOKEN_ENV)
        .map_err(|_| ClientError::ConfigError(format!("{} is not set", TOKEN_ENV)))?;
    let client: Arc<dyn DeploymentApi> = Arc::new(HttpClient::new(&options.api, SecretString::from(token))?);

    if let Some(id) = cli_args.get("logs") {
        return show_logs(client, id, cli_args.contains_key("follow")).await;
    }
    if let Some(id) = cli_args.get("inspect") {
        return inspect(client.as_ref(), id, cli_args.contains_key("wait"), &options).await;
    }
    deploy(client, cli_args, &options).await
}

async fn deploy(
    client: Arc<dyn DeploymentApi>,
    cli_args: &HashMap<String, String>,
    options: &AppOptions,
) -> Result<i32, ClientError> {
    let root = PathBuf::from(cli_args.get("path").map(String::as_str).unwrap_or("."));
    let root = root.canonicalize().map_err(|e| ClientError::file_system(&root, e))?;
    let content = ContentMap::build_async(
        root.clone(),
        list_arg(cli_args, "include"),
        list_arg(cli_args, "exclude"),
    )
    .await?;
    if content.is_empty() {
        return Err(ClientError::ConfigError(format!(
            "nothing to deploy in {}",
            root.display()
        )));
    }

    let name = match cli_args.get("name") {
        Some(name) => name.clone(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deployment".to_string()),
    };
    let mut request = DeploymentRequest::new(name);
    request.project = cli_args.get("project").cloned();
    request.target = cli_args.contains_key("prod").then_some(Target::Production);

    info!(
        "Deploying {} ({} files, {})",
        root.display(),
        content.file_count(),
        format_bytes(content.total_size())
    );

    let mut ctx = DeployContext::new(client, Arc::new(ConsoleStatus::new()));
    ctx.on_log = Some(Arc::new(|entry: LogEntry| print_entry(&entry)));

    let attempt = with_deadline(
        options.timeout,
        process_deployment(&ctx, request, Arc::new(content), &options.process),
    );
    let outcome = tokio::select! {
        outcome = attempt => outcome?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, abandoning deployment");
            return Ok(130);
        }
    };

    report(&outcome);
    Ok(outcome.exit_code())
}

fn report(outcome: &DeploymentOutcome) {
    match outcome {
        DeploymentOutcome::Ready { deployment, .. } => {
            let url = deployment.aliases.first().unwrap_or(&deployment.url);
            println!("https://{}", url);
        }
        DeploymentOutcome::MissingProjectSettings(body) => {
            eprintln!("Project settings are required: {}", body.message);
            if let Some(framework) = body.framework.as_ref().and_then(|f| f.name.as_ref()) {
                eprintln!("Detected framework: {}", framework);
            }
        }
        DeploymentOutcome::Forbidden(body) => eprintln!("Forbidden: {}", body.message),
        DeploymentOutcome::ChecksFailed(deployment) => {
            eprintln!("Checks failed for https://{}", deployment.url)
        }
        DeploymentOutcome::Canceled(deployment) => {
            eprintln!("Deployment https://{} was canceled", deployment.url)
        }
    }
}

async fn show_logs(client: Arc<dyn DeploymentApi>, id: &str, follow: bool) -> Result<i32, ClientError> {
    let cancel = CancellationToken::new();
    let query = LogQuery {
        follow,
        ..Default::default()
    };
    let mut subscription = BuildLogSubscriber::new(client)
        .subscribe(id, query, cancel.clone())
        .await?;

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    while let Some(entry) = subscription.next().await {
        print_entry(&entry?);
    }
    Ok(0)
}

async fn inspect(client: &dyn DeploymentApi, id: &str, wait: bool, options: &AppOptions) -> Result<i32, ClientError> {
    let deployment = if wait {
        with_deadline(options.timeout, wait_for_ready(client, id, DEFAULT_POLL_INTERVAL)).await?
    } else {
        client.get_deployment(id).await?
    };
    println!("{}", serde_json::to_string_pretty(&deployment)?);
    Ok(0)
}

fn list_arg(cli_args: &HashMap<String, String>, key: &str) -> Vec<String> {
    cli_args
        .get(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
