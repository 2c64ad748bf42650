mod compositor;
mod config;
mod dispatch;
mod logging;
mod reconcile;
mod sampler;
mod surface;
mod utils;
mod widgets;

use std::process::ExitCode;

use anyhow::Context as _;
use futures::StreamExt as _;
use tokio_util::task::AbortOnDropHandle;

use crate::{
    compositor::EventListener,
    config::Config,
    dispatch::{UiTx, ui_queue},
    surface::{TermEvent, TermSurface, term_events},
    utils::ResultExt as _,
    widgets::{Bar, DEFAULT_LAYOUT, InitCtx},
};

fn main() -> ExitCode {
    logging::init_logger();
    main_inner().unwrap_or(ExitCode::FAILURE)
}

fn main_inner() -> Option<ExitCode> {
    let config = Config::from_env()
        .context("Invalid configuration")
        .ok_or_log()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the tokio runtime")
        .ok_or_log()?;
    let _guard = runtime.enter();

    // The main thread stays the presentation thread for the whole run.
    runtime.block_on(run(config)).ok_or_log()?;
    Some(ExitCode::SUCCESS)
}

async fn run(config: Config) -> anyhow::Result<()> {
    let mut listener = EventListener::connect(&config.socket_path()).await?;
    let surface = TermSurface::stdout().context("Failed to set up the terminal")?;

    let (ui_tx, ui_rx) = ui_queue();
    let mut tasks = Vec::new();
    let mut bar = Bar::new(Box::new(surface));
    bar.initialize(
        DEFAULT_LAYOUT,
        &mut InitCtx {
            ui_tx: &ui_tx,
            config: &config,
            listener: &mut listener,
            tasks: &mut tasks,
        },
    );
    tasks.push(listener.spawn());
    tasks.push(spawn_input(ui_tx.clone()));
    tasks.push(spawn_signals(ui_tx)?);

    let res = bar.run(ui_rx, config.tick).await;
    log::info!("Shutting down");
    drop(tasks);
    res
}

fn spawn_input(ui_tx: UiTx<Bar>) -> AbortOnDropHandle<()> {
    AbortOnDropHandle::new(tokio::spawn(async move {
        let events = term_events();
        tokio::pin!(events);
        while let Some(ev) = events.next().await {
            let flow = match ev {
                TermEvent::Input { column, input } => {
                    ui_tx.enqueue(move |bar| bar.on_input(column, input))
                }
                TermEvent::Resize(width) => {
                    ui_tx.enqueue(move |bar| bar.surface_mut().resize(width))
                }
                TermEvent::Quit => ui_tx.enqueue(Bar::quit),
            };
            if flow.is_break() {
                break;
            }
        }
        log::debug!("Terminal input ended");
    }))
}

fn spawn_signals(ui_tx: UiTx<Bar>) -> anyhow::Result<AbortOnDropHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to watch SIGINT")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to watch SIGTERM")?;
    let mut sigusr1 =
        signal(SignalKind::user_defined1()).context("Failed to watch SIGUSR1")?;

    Ok(AbortOnDropHandle::new(tokio::spawn(async move {
        loop {
            let flow = tokio::select! {
                Some(()) = sigint.recv() => {
                    log::info!("Received SIGINT");
                    ui_tx.enqueue(Bar::quit)
                }
                Some(()) = sigterm.recv() => {
                    log::info!("Received SIGTERM");
                    ui_tx.enqueue(Bar::quit)
                }
                Some(()) = sigusr1.recv() => ui_tx.enqueue(Bar::reload_all),
                else => break,
            };
            if flow.is_break() {
                break;
            }
        }
    })))
}
