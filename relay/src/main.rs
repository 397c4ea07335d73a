mod args;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use args::{Args, Command};
use clap::Parser;
use relay_config::Config;
use relay_llm::stream::StreamDelta;
use relay_llm::types::{IntoCanonical, SharedBroadcaster};
use relay_llm::{Adapter, Generator, HttpTransport, LifecycleEvent, Outcome, Prompt};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    relay_telemetry::init(&config.telemetry, args.log.as_deref())?;

    let (name, provider) = match &args.provider {
        Some(name) => config
            .llm
            .providers
            .get_key_value(name)
            .ok_or_else(|| anyhow::anyhow!("provider '{name}' is not configured"))?,
        None => config
            .llm
            .providers
            .first()
            .ok_or_else(|| anyhow::anyhow!("no provider configured"))?,
    };
    tracing::info!(provider = %name, config_path = %args.config.display(), "starting relay");

    let adapter = Adapter::from_config(provider)?;
    let transport = match args.timeout {
        Some(seconds) => HttpTransport::with_timeout(Duration::from_secs(seconds))?,
        None => HttpTransport::new(),
    };
    let generator = Generator::new(adapter, Arc::new(transport));

    let raw = std::fs::read_to_string(&args.prompt)
        .map_err(|e| anyhow::anyhow!("failed to read prompt {}: {e}", args.prompt.display()))?;
    let document: serde_json::Value = serde_json::from_str(&raw)?;
    let mut prompt = IntoCanonical::<Prompt>::into_canonical(document)?;

    match args.command {
        Command::CountTokens => {
            println!("{}", generator.count_tokens(&prompt).await?);
            return Ok(());
        }
        Command::ListModels => {
            for model in generator.list_models(&prompt).await? {
                println!("{model}");
            }
            return Ok(());
        }
        Command::Generate => {}
    }

    if args.stream {
        prompt = prompt.streaming(Some(SharedBroadcaster::new(print_text)));
    }

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, aborting generation");
            cancel_clone.cancel();
        }
    });

    match generator.run(&mut prompt, &cancel).await? {
        Outcome::Completed(response) => {
            if args.stream {
                println!();
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Outcome::Handled => tracing::warn!("generation failed and was handled"),
    }

    Ok(())
}

/// Print streamed text deltas as they arrive
fn print_text(event: &LifecycleEvent) {
    if let LifecycleEvent::Update {
        delta: StreamDelta::Text { text },
        ..
    } = event
    {
        let mut stdout = std::io::stdout().lock();
        if write!(stdout, "{text}").and_then(|()| stdout.flush()).is_err() {
            tracing::debug!("stdout closed");
        }
    }
}
