//! Stackup - Entry Point
//!
//! Packages nested CloudFormation templates, deploys them through changesets
//! and tears stacks down again.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::Utc;
use colored::Colorize;
use stack_models::{DeploymentResult, Parameters, StackEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use stackup::cloud::registry::ClientRegistry;
use stackup::cloud::IdentityApi;
use stackup::deploy::bucket::default_bucket;
use stackup::deploy::workflows::{OutputBindings, StackSpec};
use stackup::deploy::StackEngine;
use stackup::errors::DeployError;
use stackup::filesys::file::File;
use stackup::logs::init_logging;
use stackup::storage::layout::StorageLayout;
use stackup::storage::settings::Settings;
use stackup::utils::{version_from_time, version_info};
use stackup::workers::event_tailer::EventSink;

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
            Err(e) => eprintln!("Unable to print version: {}", e),
        }
        return;
    }

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings_file = match cli_args.get("settings") {
        Some(path) => File::new(path),
        None => layout.settings_file(),
    };
    let settings = if settings_file.exists().await {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!(
                    "Unable to read settings file {}: {}",
                    settings_file.path().display(),
                    e
                );
                std::process::exit(1);
            }
        }
    } else {
        Settings::default()
    };

    // Initialize logging
    let _log_guard = match init_logging(settings.log_options(&layout)) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Cancel in-flight operations on shutdown
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        await_shutdown_signal().await;
        shutdown.cancel();
    });

    if let Err(e) = run(&cli_args, &settings, cancel).await {
        error!("{:#}", e);
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(
    cli_args: &HashMap<String, String>,
    settings: &Settings,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let region = cli_args
        .get("region")
        .cloned()
        .unwrap_or_else(|| settings.region.clone());
    let stack_name = cli_args
        .get("stack")
        .cloned()
        .ok_or_else(|| anyhow!("--stack=<name> is required"))?;
    let dry_run = cli_args.contains_key("dry-run");

    let options = settings.engine_options();
    let registry = ClientRegistry::new(options.wait_policy());
    let clients = registry.for_region(&region).await;
    let identity = clients.identity.clone();
    let engine = StackEngine::new(clients, options)
        .with_sink(Arc::new(ConsoleSink))
        .with_cancellation(cancel);
    debug!("Engine for {} with {:?}", engine.region(), engine.options());

    if let Some(change_set) = cli_args.get("changeset") {
        print_changes(&engine, change_set).await?;
        return Ok(());
    }

    if cli_args.contains_key("outputs") {
        let outputs = engine
            .stack_outputs(&stack_name)
            .await
            .with_context(|| format!("Failed to read outputs of {}", stack_name))?;
        for (key, value) in outputs {
            println!("{} = {}", key.bold(), value);
        }
        return Ok(());
    }

    if cli_args.contains_key("down") {
        let dependents: Vec<String> = cli_args
            .get("dependents")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        engine
            .environment_down(&stack_name, &dependents)
            .await
            .with_context(|| format!("Failed to delete {}", stack_name))?;
        println!("{} Stack deleted: {}", "✓".green().bold(), stack_name.bold());
        return Ok(());
    }

    let spec = stack_spec(cli_args, settings, identity.as_ref(), &region, &stack_name).await?;
    info!(
        "Packaging {} to s3://{}/{}",
        stack_name, spec.locator.bucket, spec.locator.prefix
    );
    let outcome = if cli_args.contains_key("create") {
        engine.package_and_create(&spec, dry_run).await
    } else if let Some(environment) = cli_args.get("environment") {
        let bindings: OutputBindings = prefixed(cli_args, "bind.");
        engine.service_up(environment, &spec, &bindings, dry_run).await
    } else if cli_args.contains_key("up") {
        engine.environment_up(&spec, dry_run).await
    } else {
        engine.package_and_deploy(&spec, dry_run).await
    };
    let result = outcome.with_context(|| format!("Failed to deploy {}", stack_name))?;

    report(&engine, &stack_name, &result, dry_run).await
}

async fn stack_spec(
    cli_args: &HashMap<String, String>,
    settings: &Settings,
    identity: &dyn IdentityApi,
    region: &str,
    stack_name: &str,
) -> anyhow::Result<StackSpec> {
    let template = cli_args
        .get("template")
        .ok_or_else(|| anyhow!("--template=<file> is required"))?;

    let bucket = match cli_args.get("bucket").or(settings.bucket.as_ref()) {
        Some(bucket) => bucket.clone(),
        None => default_bucket(
            identity,
            &settings.bucket_prefix,
            region,
            settings.account_id.as_deref(),
        )
        .await
        .context("Unable to determine the account for the default bucket")?,
    };
    let base_prefix = cli_args.get("prefix").map(String::as_str).unwrap_or(stack_name);
    let version = version_from_time(Utc::now());

    let mut spec = StackSpec::versioned(
        stack_name,
        File::new(template),
        &bucket,
        region,
        base_prefix,
        &version,
    );
    spec.parameters = prefixed(cli_args, "param.");
    spec.tags.extend(prefixed(cli_args, "tag."));
    Ok(spec)
}

/// Collect `--<prefix><Key>=<value>` arguments
fn prefixed(cli_args: &HashMap<String, String>, prefix: &str) -> Parameters {
    cli_args
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .map(|name| (name.to_string(), value.clone()))
        })
        .collect()
}

async fn report(
    engine: &StackEngine,
    stack_name: &str,
    result: &DeploymentResult,
    dry_run: bool,
) -> anyhow::Result<()> {
    if !result.did_require_updating {
        println!("{} No updates were required to {}", "•".dimmed(), stack_name.bold());
        return Ok(());
    }

    if dry_run {
        println!("{} Dry run for {}", "→".cyan().bold(), stack_name.bold());
        if !result.change_set_id.is_empty() {
            print_changes(engine, &result.change_set_id).await?;
        }
        return Ok(());
    }

    info!("Deployed {} ({})", stack_name, result.stack_id);
    println!("{} Stack deployed: {}", "✓".green().bold(), stack_name.bold());
    Ok(())
}

async fn print_changes(engine: &StackEngine, change_set: &str) -> anyhow::Result<()> {
    let description = engine
        .describe_change_set(change_set)
        .await
        .with_context(|| format!("Failed to describe changeset {}", change_set))?;

    println!("{} {}", "Changeset".bold(), description.id.dimmed());
    for line in description.summary_lines() {
        println!("  {} {}", "•".dimmed(), line);
    }
    Ok(())
}

/// Prints stack events with their status highlighted
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: Result<&StackEvent, &DeployError>) {
        match event {
            Ok(event) => {
                let status = &event.resource_status;
                let status = if status.contains("FAILED") {
                    status.red()
                } else if status.contains("ROLLBACK") {
                    status.yellow()
                } else if status.ends_with("COMPLETE") {
                    status.green()
                } else {
                    status.cyan()
                };
                match &event.status_reason {
                    Some(reason) => println!(
                        "  {} {} {}",
                        event.logical_resource_id.bold(),
                        status,
                        reason.dimmed()
                    ),
                    None => println!("  {} {}", event.logical_resource_id.bold(), status),
                }
            }
            Err(e) => eprintln!("  {} {}", "event poll failed:".yellow(), e),
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers");
                    std::future::pending::<()>().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, cancelling...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, cancelling...");
    }
}
