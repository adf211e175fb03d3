//! Background producers that feed the content model.
//!
//! Every module runs on its own thread and never touches Wayland objects. After publishing it
//! asks for a refresh through the [`Notifier`], which wakes the dispatch loop; the loop does
//! the drawing.

pub mod battery;
pub mod clock;
pub mod hyprland;

use std::{
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Context;

use crate::{
    content::{ContentModel, Layout},
    field::Field,
    ipc::HyprSockets,
};

pub use battery::Battery;
pub use clock::Clock;
pub use hyprland::Hyprland;

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct CancelState {
    cancelled: bool,
    hooks: Vec<Hook>,
}

/// Cooperative cancellation shared between a module thread and the runtime.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<CancelState>, Condvar)>,
}

impl CancelToken {
    fn lock(&self) -> MutexGuard<'_, CancelState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Flags cancellation, wakes sleepers and runs the registered hooks.
    pub fn cancel(&self) {
        let hooks = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.hooks)
        };
        self.inner.1.notify_all();
        for hook in hooks {
            hook();
        }
    }

    /// Registers `hook` to interrupt a blocking call. Runs at once if already cancelled.
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        let mut state = self.lock();
        if state.cancelled {
            drop(state);
            hook();
        } else {
            state.hooks.push(Box::new(hook));
        }
    }

    /// Sleeps for `duration`. Returns false if cancelled first.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.lock();
        while !state.cancelled {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = self
                .inner
                .1
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        false
    }
}

/// Thread-safe handle for waking the dispatch loop.
#[derive(Clone)]
pub struct Notifier {
    wake: Arc<dyn Fn() + Send + Sync>,
    exit: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
}

impl Notifier {
    pub fn new(wake: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            wake: Arc::new(wake),
            exit: Arc::default(),
            failed: Arc::default(),
        }
    }

    /// Asks for a render pass. Requests made before the loop wakes collapse into one.
    pub fn request_refresh(&self) {
        (self.wake)();
    }

    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::SeqCst);
        (self.wake)();
    }

    /// Requests exit with a failure status.
    pub fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.request_exit();
    }

    pub fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

/// What a running module gets to talk to.
pub struct ModuleContext {
    pub cancel: CancelToken,
    pub model: Arc<ContentModel>,
    pub notifier: Notifier,
}

impl ModuleContext {
    /// Publishes `module`'s current text and requests a redraw.
    pub fn publish(&self, module: &dyn Module) {
        module.publish(&self.model);
        self.notifier.request_refresh();
    }
}

pub trait Module: Send + 'static {
    fn name(&self) -> &'static str;

    /// Writes the module's current text into the model.
    fn publish(&self, model: &ContentModel);

    /// Runs until cancelled or the source ends. Resources are released on return.
    fn run(self: Box<Self>, ctx: ModuleContext) -> anyhow::Result<()>;
}

/// Connects the modules the layout asks for. Any failure here is fatal.
pub fn from_layout(layout: &Layout) -> anyhow::Result<Vec<Box<dyn Module>>> {
    let mut modules: Vec<Box<dyn Module>> = Vec::new();

    if layout.contains(Field::Clock) {
        modules.push(Box::new(Clock::new()));
    }
    if layout.contains(Field::Battery) {
        let battery = Battery::connect().context("failed to read battery state from UPower")?;
        modules.push(Box::new(battery));
    }
    if layout.fields().any(Field::is_hyprland) {
        let sockets = HyprSockets::from_env()?;
        let hyprland = Hyprland::connect(&sockets).context("failed to connect to Hyprland")?;
        modules.push(Box::new(hyprland));
    }

    Ok(modules)
}

struct ModuleHandle {
    name: &'static str,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

/// The set of running module threads.
pub struct Runtime {
    handles: Vec<ModuleHandle>,
}

impl Runtime {
    pub fn start(
        modules: Vec<Box<dyn Module>>,
        model: &Arc<ContentModel>,
        notifier: &Notifier,
    ) -> anyhow::Result<Self> {
        let mut runtime = Self {
            handles: Vec::with_capacity(modules.len()),
        };

        for module in modules {
            let name = module.name();
            // So the first frame already has real content
            module.publish(model);

            let cancel = CancelToken::default();
            let ctx = ModuleContext {
                cancel: cancel.clone(),
                model: Arc::clone(model),
                notifier: notifier.clone(),
            };

            let thread = thread::Builder::new()
                .name(format!("swab-{name}"))
                .spawn(move || {
                    let notifier = ctx.notifier.clone();
                    match module.run(ctx) {
                        Ok(()) => log::debug!("{name} module stopped"),
                        Err(err) => {
                            log::error!("{name} module failed: {err:#}");
                            notifier.fail();
                        }
                    }
                })
                .with_context(|| format!("failed to spawn {name} module thread"))?;

            log::info!("started {name} module");
            runtime.handles.push(ModuleHandle {
                name,
                cancel,
                thread,
            });
        }

        Ok(runtime)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels every module, then joins them all.
    pub fn shutdown(self) {
        for handle in &self.handles {
            handle.cancel.cancel();
        }
        for handle in self.handles {
            if handle.thread.join().is_err() {
                log::error!("{} module panicked", handle.name);
            }
        }
    }
}
