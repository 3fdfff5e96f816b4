mod cli;
mod server;

use std::sync::Arc;

use clap::Parser;
use eyre::WrapErr;
use serde::Serialize;

use bitbadge_core::explorer::{BlockExplorer, EsploraClient};
use bitbadge_core::flow::BadgeStage;
use bitbadge_core::node::{HiroNodeClient, StacksNode};
use bitbadge_core::poller::StopReason;
use bitbadge_core::store::{JsonFileStore, Session};
use bitbadge_core::{tx, AppContext};

use cli::{Cli, Command, Settings};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let Cli { settings, command } = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    // Offline commands need neither network clients nor the session file.
    match &command {
        Command::Strip { hex } => {
            let stripped = tx::strip_witness(hex).context("strip transaction")?;
            println!("{stripped}");
            return Ok(());
        }
        Command::VerifySender { hex, address } => {
            let verified = tx::verify_sender(hex, address.trim(), &settings.network);
            print_json(&serde_json::json!({
                "verified": verified,
                "network": settings.network.name,
            }))?;
            return Ok(());
        }
        _ => {}
    }

    let ctx = Arc::new(build_context(&settings)?);

    match command {
        Command::Strip { .. } | Command::VerifySender { .. } => {}
        Command::Status => print_json(&ctx.view().await)?,
        Command::Transfer => print_json(&ctx.transfer_request())?,
        Command::Reserve { txid } => {
            ctx.reserve(txid).await.context("record reservation")?;
            print_json(&ctx.view().await)?;
        }
        Command::Poll => {
            let outcome = ctx.poll_once().await.context("check payment status")?;
            print_json(&outcome)?;
        }
        Command::Watch => watch(&ctx).await?,
        Command::Mint { recipient, sender } => {
            let prepared = ctx
                .prepare_mint(recipient, sender.as_deref())
                .await
                .context("prepare mint call")?;
            if !prepared.inclusion_verified {
                tracing::warn!(
                    "local merkle check failed; the contract will likely reject this mint"
                );
            }
            print_json(&prepared)?;
        }
        Command::Check { sender } => {
            let result = ctx
                .check_mined(&sender)
                .await
                .context("run was-tx-mined-compact")?;
            println!("{result}");
        }
        Command::VerifyMerkle { sender } => {
            let check = ctx
                .verify_merkle(&sender)
                .await
                .context("run helper contract merkle checks")?;
            print_json(&check)?;
        }
        Command::Paid => {
            let received = ctx
                .payment_received()
                .await
                .context("check treasury outputs")?;
            print_json(&serde_json::json!({ "received": received }))?;
        }
        Command::Reset => {
            ctx.reset().await.context("clear session")?;
            print_json(&ctx.view().await)?;
        }
        Command::Serve { bind, port } => serve(ctx, &bind, port).await?,
    }

    Ok(())
}

fn build_context(settings: &Settings) -> eyre::Result<AppContext> {
    let config = settings.to_config();
    config.validate().context("validate configuration")?;

    let explorer: Arc<dyn BlockExplorer> = Arc::new(
        EsploraClient::new(&config.esplora_url, config.explorer_requests_per_second)
            .context("create block explorer client")?,
    );
    let node: Arc<dyn StacksNode> =
        Arc::new(HiroNodeClient::new(&config.node_url).context("create Stacks node client")?);

    let store = JsonFileStore::open(&settings.session_file)
        .with_context(|| format!("open session file {}", settings.session_file.display()))?;
    tracing::debug!(path = %settings.session_file.display(), "session loaded");

    Ok(AppContext::new(config, explorer, node, Session::new(store)))
}

fn print_json(value: &impl Serialize) -> eyre::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("render JSON output")?;
    println!("{rendered}");
    Ok(())
}

async fn watch(ctx: &Arc<AppContext>) -> eyre::Result<()> {
    let (stopped_tx, stopped_rx) = tokio::sync::oneshot::channel();
    let task = ctx.watch(move |reason| {
        let _ = stopped_tx.send(reason);
    });
    tracing::info!(
        interval_secs = ctx.config().poll_interval.as_secs(),
        "watching for confirmation"
    );

    tokio::select! {
        reason = stopped_rx => {
            if matches!(reason, Ok(StopReason::Completed)) {
                print_json(&ctx.view().await)?;
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("listen for Ctrl-C")?;
            tracing::info!("interrupted");
        }
    }
    task.stop().await;
    Ok(())
}

async fn serve(ctx: Arc<AppContext>, bind: &str, port: u16) -> eyre::Result<()> {
    let resume = ctx.view().await.stage == BadgeStage::Pending;
    let state = Arc::new(server::AppState::new(ctx));
    if resume {
        tracing::info!("resuming confirmation watcher for stored reservation");
        state.restart_watcher().await;
    }

    let bind_addr = format!("{bind}:{port}");
    let origin = format!("http://{bind}:{port}");
    let router = server::build_router(Arc::clone(&state), &origin);

    if bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and reachable from the network");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("run HTTP server")?;

    state.stop_watcher().await;
    Ok(())
}
