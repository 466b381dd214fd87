use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use volley::report::{render_table, summary_line, write_export};
use volley::{
    BatchRunner, MethodRegistry, Progress, ReqwestHttpClient, RestResolver, RunnerConfig,
    ScriptConfig,
};

mod cli;

use cli::{Cli, Commands, RunArgs};

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "volley=info",
        1 => "volley=debug",
        _ => "volley=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Run(args) => run(args, cli.json).await,
        Commands::Template {
            script_type,
            title,
            output,
        } => {
            let header = script_type.template_header();
            let target = output.or_else(|| {
                title.map(|t| format!("{}_{}.csv", t, script_type.template_suffix()).into())
            });
            match target {
                Some(path) => std::fs::write(&path, format!("{}\n", header))
                    .with_context(|| format!("writing template to {}", path.display()))
                    .map(|_| {
                        println!("Wrote {}", path.display());
                        ExitCode::SUCCESS
                    }),
                None => {
                    println!("{}", header);
                    Ok(ExitCode::SUCCESS)
                }
            }
        }
        Commands::Methods { script_type } => {
            let registry = MethodRegistry::standard();
            let methods = registry.methods(script_type.target_kind());
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&methods).unwrap_or_default());
            } else {
                for method in methods {
                    println!("{}", method);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs, json: bool) -> anyhow::Result<ExitCode> {
    let script = match (&args.script, args.script_type) {
        (Some(path), _) => ScriptConfig::load(path)
            .with_context(|| format!("loading script {}", path.display()))?,
        (None, Some(script_type)) => {
            let script = ScriptConfig::new(args.title.clone(), script_type)
                .with_method(args.method.clone())
                .with_parameters(args.parameters.clone());
            script.validate()?;
            script
        }
        (None, None) => anyhow::bail!("either --script or --type is required"),
    };

    let token = args.token.clone().unwrap_or_default();

    let config = RunnerConfig {
        concurrency: args.concurrency,
        timeout_ms: args.timeout_ms,
        row_timeout_ms: args.row_timeout_ms,
        access_token: token.clone(),
    };
    let http = ReqwestHttpClient::new();
    let resolver = RestResolver::new(http.clone(), token, config.timeout_ms);
    let runner = BatchRunner::new(resolver, http, MethodRegistry::standard(), config);

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );
    let sink = {
        let bar = bar.clone();
        move |progress: Progress| {
            bar.set_length(progress.total as u64);
            bar.set_position(progress.completed as u64);
            bar.set_message(progress.message());
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing rows already running");
                cancel.cancel();
            }
        });
    }

    let summary = runner
        .run_csv(&script, Some(args.csv.as_path()), &sink, cancel)
        .await?;
    bar.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{} Results", script.title);
        println!("{}", render_table(&summary));
        println!("{}", summary_line(&summary));
    }

    if let Some(path) = args.export {
        let path = PathBuf::from(if path.is_empty() {
            script.export_file_name()
        } else {
            path
        });
        write_export(&path, &args.export_columns, &summary)?;
    }

    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
