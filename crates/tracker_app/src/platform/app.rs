use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracker_core::{update, AppState, Msg};
use tracker_logging::{tracker_info, tracker_warn};

use super::cli::Cli;
use super::config::AppConfig;
use super::effects::EffectRunner;
use super::logging;
use super::render::Renderer;

const TICK: Duration = Duration::from_millis(75);

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    logging::initialize(config.log_destination, config.level_filter());

    let settings = config.api_settings(cli.server.as_deref())?;
    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(settings, msg_tx.clone()).context("starting engine")?;

    for msg in cli.command.into_messages(Utc::now()) {
        let _ = msg_tx.send(msg);
    }

    let mut app = App::new(runner);
    let deadline = config.watch_timeout().map(|limit| Instant::now() + limit);
    loop {
        let first = match msg_rx.recv_timeout(TICK) {
            Ok(msg) => msg,
            Err(mpsc::RecvTimeoutError::Timeout) => Msg::Tick,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        app.dispatch(first);
        while let Ok(msg) = msg_rx.try_recv() {
            app.dispatch(msg);
        }

        if app.state.is_settled() {
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracker_warn!("Gave up waiting after {:?}", config.watch_timeout());
            println!("note: stopped waiting; jobs are still running on the server");
            break;
        }
    }

    app.dispatch(Msg::Shutdown);
    tracker_info!("Exiting");
    Ok(())
}

struct App {
    state: AppState,
    runner: EffectRunner,
    renderer: Renderer,
}

impl App {
    fn new(runner: EffectRunner) -> Self {
        Self {
            state: AppState::new(),
            runner,
            renderer: Renderer::new(),
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        self.runner.enqueue(effects);
        if state.consume_dirty() {
            for line in self.renderer.render(&state.view()) {
                println!("{line}");
            }
        }
        self.state = state;
    }
}
