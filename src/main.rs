use std::{fs::File, sync::Arc};

use anyhow::Context;
use clap::Parser;
use smithay_client_toolkit::reexports::{
    calloop::{EventLoop, PostAction, ping::make_ping},
    calloop_wayland_source::WaylandSource,
};
use wayland_client::{Connection, globals::registry_queue_init};

use swab::{
    Bar, Cli, Config, ContentModel, CosmicShaper, Display, Painter,
    modules::{self, Notifier, Runtime},
    stdin::{self, LineBuffer, StdinEvent},
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from(Cli::parse());
    if let Err(err) = run(config) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(config: Config) -> anyhow::Result<()> {
    let conn = Connection::connect_to_env().context("failed to connect to the Wayland display")?;
    let (globals, mut event_queue) = registry_queue_init(&conn)?;
    let qh = event_queue.handle();

    let display = Display::open(&globals, &qh, config.height, config.edge)?;
    let model = Arc::new(ContentModel::new(config.layout.clone()));
    let painter = Painter::new(CosmicShaper::new(), config.font.clone(), config.theme);
    let mut bar = Bar::new(display, painter, Arc::clone(&model));

    // Outputs present at startup are announced here
    event_queue.roundtrip(&mut bar)?;

    let mut event_loop: EventLoop<Bar> = EventLoop::try_new()?;
    let loop_handle = event_loop.handle();

    WaylandSource::new(conn, event_queue)
        .insert(loop_handle.clone())
        .map_err(|err| anyhow::anyhow!("failed to watch the Wayland socket: {}", err.error))?;

    let (ping, ping_source) = make_ping()?;
    loop_handle
        .insert_source(ping_source, |(), _, bar| bar.request_refresh())
        .map_err(|err| anyhow::anyhow!("failed to register refresh source: {}", err.error))?;
    let notifier = Notifier::new(move || ping.ping());

    {
        let notifier = notifier.clone();
        ctrlc::set_handler(move || notifier.request_exit())
            .context("failed to install signal handler")?;
    }

    if model.layout().reads_stdin() {
        let mut lines = LineBuffer::default();
        loop_handle
            .insert_source(stdin::source()?, move |_, file, bar| {
                let mut reader: &File = file.as_ref();
                match stdin::read_once(&mut reader, &mut lines) {
                    Ok(StdinEvent::Line(line)) => {
                        bar.model().set_status(&line);
                        bar.request_refresh();
                        Ok(PostAction::Continue)
                    }
                    Ok(StdinEvent::Partial) => Ok(PostAction::Continue),
                    Ok(StdinEvent::Closed) => {
                        log::info!("stdin closed, keeping the last status");
                        Ok(PostAction::Remove)
                    }
                    Err(err) => {
                        log::warn!("stdin read failed, ignoring further input: {err}");
                        Ok(PostAction::Remove)
                    }
                }
            })
            .map_err(|err| anyhow::anyhow!("failed to watch stdin: {}", err.error))?;
    }

    let modules = modules::from_layout(model.layout())?;
    let runtime = Runtime::start(modules, &model, &notifier)?;
    bar.request_refresh();

    let result = dispatch_forever(&mut event_loop, &mut bar, &notifier);

    log::info!("shutting down");
    runtime.shutdown();
    bar.display.close();
    // Globals go before the connection the event loop owns
    drop(bar);
    drop(event_loop);

    result?;
    if notifier.failed() {
        anyhow::bail!("a module stopped unexpectedly");
    }
    Ok(())
}

fn dispatch_forever(
    event_loop: &mut EventLoop<Bar>,
    bar: &mut Bar,
    notifier: &Notifier,
) -> anyhow::Result<()> {
    while !notifier.exit_requested() {
        event_loop.dispatch(None, bar)?;

        if let Some(err) = bar.take_error() {
            return Err(err).context("failed to render bar");
        }
        if bar.take_refresh() {
            bar.render_all().context("failed to render bar")?;
        }
    }
    Ok(())
}
