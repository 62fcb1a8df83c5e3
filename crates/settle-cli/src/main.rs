mod cli;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use settle_core::{
    EventLoop, LoopConfig, LoopCounts, RejectCallback, Resolution, ResolveCallback, Settlable,
    SettleState, Settlement, Thenable,
};
use tokio::task::LocalSet;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands};

/// 各シナリオで stdout に出す JSON
#[derive(Debug, Serialize)]
struct Report<T, E> {
    scenario: &'static str,
    state: SettleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    settlement: Option<Settlement<T, E>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    defect: Option<String>,
    counts: LoopCounts,
}

impl<T: Clone, E: Clone> Report<T, E> {
    fn of(scenario: &'static str, event_loop: &EventLoop, settlable: &Settlable<T, E>) -> Self {
        Self {
            scenario,
            state: settlable.state(),
            settlement: settlable.settlement(),
            defect: None,
            counts: event_loop.counts(),
        }
    }
}

/// fulfillment コールバックを二回呼ぶ thenable（効くのは最初の一回だけ）
struct TwiceThenable;

impl Thenable<String, String> for TwiceThenable {
    fn then(
        &self,
        on_fulfilled: ResolveCallback<String, String>,
        _on_rejected: RejectCallback<String, String>,
    ) -> Result<(), String> {
        on_fulfilled.fulfill("A".to_string());
        on_fulfilled.fulfill("B".to_string());
        Ok(())
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout は JSON レポート用なのでログは stderr へ
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn print_report<T: Serialize, E: Serialize>(report: &Report<T, E>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => LoopConfig::from_json_file(path)?,
        None => LoopConfig::default_v1(),
    };
    tracing::debug!(?config, "loop config");
    let event_loop = EventLoop::new(config);

    match cli.command {
        Commands::Chain { start, links } => {
            let mut current: Settlable<i64, String> = event_loop.fulfilled(start);
            for _ in 0..links {
                current = current.then_fulfilled(|v| Ok(Resolution::Value(v + 1)));
            }
            event_loop.run_until_settled(&current)?;
            print_report(&Report::of("chain", &event_loop, &current))
        }

        Commands::Recover { reason } => {
            let rejected: Settlable<String, String> = event_loop.rejected(reason);
            let recovered =
                rejected.then_with(None, Some(Box::new(|reason| Ok(Resolution::Value(reason)))));
            event_loop.run_until_settled(&recovered)?;
            print_report(&Report::of("recover", &event_loop, &recovered))
        }

        Commands::Thenable => {
            let deferred = event_loop.deferred::<String, String>();
            deferred
                .resolve
                .resolve(Resolution::thenable(TwiceThenable))?;
            event_loop.run_until_idle()?;
            print_report(&Report::of("thenable", &event_loop, &deferred.settlable))
        }

        Commands::Deferred { delay_ms, value } => {
            let deferred = event_loop.deferred::<i64, String>();
            let observed = deferred
                .settlable
                .then_fulfilled(|v| Ok(Resolution::Value(v)));

            let resolve = deferred.resolve.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                tracing::info!(value, "timer fired");
                resolve.fulfill(value);
            });

            event_loop.drive(&observed).await?;
            print_report(&Report::of("deferred", &event_loop, &observed))
        }

        Commands::Cycle => {
            let deferred = event_loop.deferred::<i64, String>();
            let outcome = deferred.resolve.resolve(deferred.settlable.clone());
            let mut report = Report::of("cycle", &event_loop, &deferred.settlable);
            match outcome {
                Err(defect) => {
                    tracing::warn!(%defect, "self-resolution rejected as a defect");
                    report.defect = Some(defect.to_string());
                }
                Ok(()) => anyhow::bail!("self-resolution was accepted"),
            }
            print_report(&report)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // settlable は !Send なので、全部一つの LocalSet 上で動かす
    let local = LocalSet::new();
    local
        .run_until(run(cli))
        .await
        .context("settle scenario failed")
}
