use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use anyhow::Context;
use futures::{
    executor::{LocalPool, LocalSpawner},
    task::LocalSpawnExt,
    FutureExt,
};
use turtlebox::{Command, CommandSink, Screen};

use crate::{
    bindings, coerce_text, Config, EventSink, Inbound, InputBridge, InputRewrite, LineBuffer,
    Outbound, ScriptRuntime, Stream, Value,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Running,
    /// The runtime couldn't be started, and never will be.
    Failed,
}

pub type RuntimeFactory<R> = Box<dyn FnOnce() -> anyhow::Result<R>>;

/// Sends drawing commands to the UI.
struct CanvasForwarder(Rc<dyn EventSink>);

impl CommandSink for CanvasForwarder {
    fn send(&mut self, cmd: Command) {
        self.0.post(Outbound::CanvasCmd { cmd });
    }
}

struct Session<R> {
    runtime: R,
    screen: Rc<RefCell<Screen>>,
    bridge: InputBridge,
    rewrite: Option<InputRewrite>,
    stdout: Rc<LineBuffer>,
    stderr: Rc<LineBuffer>,
}

/// Runs user scripts on behalf of a UI, one protocol message at a time.
///
/// The script runtime is created on the first `init` or `run`, and lives until the host is
/// dropped. Scripts run on a single-threaded pool that the host drives after every message; a
/// script waiting for input just sits in the pool until the matching `input_response` arrives.
///
/// Nothing stops a second `run` from starting while an earlier one is still waiting for input.
/// Both stay alive, and their output and drawing interleave.
pub struct Host<R> {
    config: Config,
    events: Rc<dyn EventSink>,
    factory: Option<RuntimeFactory<R>>,
    session: Option<Session<R>>,
    failure: Option<String>,
    initializing: bool,
    active_runs: Rc<Cell<usize>>,
    pool: LocalPool,
    spawner: LocalSpawner,
}

impl<R: ScriptRuntime + 'static> Host<R> {
    pub fn new(
        config: Config,
        events: Rc<dyn EventSink>,
        factory: impl FnOnce() -> anyhow::Result<R> + 'static,
    ) -> Host<R> {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Host {
            config,
            events,
            factory: Some(Box::new(factory)),
            session: None,
            failure: None,
            initializing: false,
            active_runs: Rc::default(),
            pool,
            spawner,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.initializing {
            Lifecycle::Initializing
        } else if self.failure.is_some() {
            Lifecycle::Failed
        } else if self.session.is_none() {
            Lifecycle::Uninitialized
        } else if self.active_runs.get() > 0 {
            Lifecycle::Running
        } else {
            Lifecycle::Ready
        }
    }

    /// Dispatches one message, then lets any runnable scripts make progress.
    pub fn handle(&mut self, msg: Inbound) {
        log::debug!("handling {msg:?}");
        match msg {
            Inbound::Init => {
                self.initialize();
            }
            Inbound::Run { code } => self.run(code.as_deref().unwrap_or_default()),
            Inbound::InputResponse { text } => {
                self.respond(coerce_text(&text));
            }
        }
        self.poll();
    }

    /// Runs scripts until every one of them is either finished or waiting for input.
    pub fn poll(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Starts the runtime, if that hasn't been tried yet. Returns whether it's up.
    ///
    /// If starting failed (now or earlier), an `error` event says why.
    pub fn initialize(&mut self) -> bool {
        if self.session.is_some() {
            return true;
        }
        if let Some(failure) = &self.failure {
            self.events.post(Outbound::Error {
                text: failure.clone(),
            });
            return false;
        }

        log::info!("initializing");
        self.initializing = true;
        self.events.post(Outbound::Status {
            text: self.config.status.loading.clone(),
        });
        let session = match self.factory.take() {
            Some(factory) => self.start_session(factory),
            None => Err(anyhow::anyhow!("the runtime has already been started once")),
        };
        self.initializing = false;

        match session {
            Ok(session) => {
                self.session = Some(session);
                log::info!("ready");
                self.events.post(Outbound::Ready);
                true
            }
            Err(e) => {
                let text = format!("{e:#}");
                log::error!("initialization failed: {text}");
                self.failure = Some(text.clone());
                self.events.post(Outbound::Error { text });
                false
            }
        }
    }

    fn start_session(&self, factory: RuntimeFactory<R>) -> anyhow::Result<Session<R>> {
        let mut runtime = factory().context("failed to start the script runtime")?;

        let stdout = Rc::new(LineBuffer::new(Stream::Stdout, Rc::clone(&self.events)));
        let stderr = Rc::new(LineBuffer::new(Stream::Stderr, Rc::clone(&self.events)));
        for (stream, buf) in [(Stream::Stdout, &stdout), (Stream::Stderr, &stderr)] {
            let buf = Rc::clone(buf);
            runtime.set_output(stream, Rc::new(move |text: &str| buf.write(text)));
        }

        let bridge = InputBridge::new(self.config.input_policy, Rc::clone(&self.events));
        let reader = bridge.clone();
        let flush_before_asking = Rc::clone(&stdout);
        runtime.replace_input(Rc::new(move |args: Vec<Value>| {
            flush_before_asking.flush();
            let prompt = args.first().map(Value::to_text).unwrap_or_default();
            let answer = reader.request(&prompt);
            async move { Ok::<_, String>(Some(Value::Text(answer.await))) }.boxed_local()
        }));

        let canvas = CanvasForwarder(Rc::clone(&self.events));
        let screen = Rc::new(RefCell::new(Screen::with_sink(
            self.config.canvas.clone(),
            Box::new(canvas),
        )));
        bindings::install(&mut runtime, &screen);

        let rewrite = runtime.input_rewrite();
        Ok(Session {
            runtime,
            screen,
            bridge,
            rewrite,
            stdout,
            stderr,
        })
    }

    /// Starts `code` on a fresh canvas. It makes progress on the next [`poll`](Host::poll).
    pub fn run(&mut self, code: &str) {
        if !self.initialize() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        log::info!("running {} bytes of script", code.len());
        self.events.post(Outbound::Status {
            text: self.config.status.running.clone(),
        });
        session.screen.borrow_mut().restart();

        let script = match &session.rewrite {
            Some(rewrite) => session.runtime.run(&rewrite.apply(code)),
            None => session.runtime.run(code),
        };
        let stdout = Rc::clone(&session.stdout);
        let stderr = Rc::clone(&session.stderr);
        let events = Rc::clone(&self.events);
        let active = Rc::clone(&self.active_runs);
        active.set(active.get() + 1);

        let task = async move {
            let result = script.await;
            stdout.flush();
            stderr.flush();
            active.set(active.get() - 1);
            match result {
                Ok(()) => {
                    log::info!("script finished");
                    events.post(Outbound::Done);
                }
                Err(text) => {
                    log::info!("script failed: {text}");
                    events.post(Outbound::Error { text });
                }
            }
        };
        if let Err(e) = self.spawner.spawn_local(task) {
            self.active_runs.set(self.active_runs.get() - 1);
            self.events.post(Outbound::Error {
                text: format!("couldn't start the script: {e}"),
            });
        }
    }

    /// Hands `text` to whoever is waiting for input. Returns `false` (and does nothing else) if
    /// nobody is.
    pub fn respond(&mut self, text: String) -> bool {
        match &self.session {
            Some(session) => session.bridge.respond(text),
            None => false,
        }
    }

    pub fn pending_inputs(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.bridge.pending())
    }

    pub fn screen(&self) -> Option<Rc<RefCell<Screen>>> {
        self.session
            .as_ref()
            .map(|session| Rc::clone(&session.screen))
    }
}
