use crate::{Command, CommandSink, INSTANT};

/// Whether commands go straight to the rendering surface or wait for an explicit update.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Immediate,
    Buffered,
}

/// The arguments of the most recent `tracer` call.
///
/// `n == 0` means "buffer until `update()`"; anything else means "draw immediately". The delay
/// is a hint for the rendering surface, and we never look at it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TracerState {
    pub n: i64,
    pub delay: Option<f64>,
}

impl Default for TracerState {
    fn default() -> Self {
        TracerState { n: 1, delay: None }
    }
}

impl TracerState {
    pub fn mode(&self) -> Mode {
        if self.n == 0 {
            Mode::Buffered
        } else {
            Mode::Immediate
        }
    }
}

/// Commands waiting to be delivered, oldest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandQueue {
    cmds: Vec<Command>,
}

impl CommandQueue {
    pub fn push(&mut self, cmd: Command) {
        self.cmds.push(cmd);
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.cmds.iter()
    }

    /// Hands every queued command to `sink`, in order, leaving the queue empty.
    ///
    /// Returns the number of commands delivered.
    pub fn flush_into(&mut self, sink: &mut dyn CommandSink) -> usize {
        let cmds = std::mem::take(&mut self.cmds);
        let count = cmds.len();
        for cmd in cmds {
            sink.send(cmd);
        }
        count
    }

    /// Drops everything, returning how many commands were lost.
    pub fn discard(&mut self) -> usize {
        let count = self.cmds.len();
        self.cmds.clear();
        count
    }
}

/// Routes commands to the rendering surface according to the tracer mode.
///
/// Until a sink is attached, everything is queued (whatever the mode), and attaching a sink in
/// immediate mode delivers the backlog.
#[derive(Default)]
pub struct Batcher {
    tracer: TracerState,
    queue: CommandQueue,
    sink: Option<Box<dyn CommandSink>>,
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("tracer", &self.tracer)
            .field("queue", &self.queue)
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

impl Batcher {
    pub fn new() -> Batcher {
        Batcher::default()
    }

    pub fn with_sink(sink: Box<dyn CommandSink>) -> Batcher {
        Batcher {
            sink: Some(sink),
            ..Batcher::default()
        }
    }

    pub fn attach(&mut self, sink: Box<dyn CommandSink>) {
        self.sink = Some(sink);
        if self.mode() == Mode::Immediate {
            self.flush();
        }
    }

    pub fn detach(&mut self) -> Option<Box<dyn CommandSink>> {
        self.sink.take()
    }

    pub fn mode(&self) -> Mode {
        self.tracer.mode()
    }

    pub fn tracer_state(&self) -> TracerState {
        self.tracer
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Sends a pose-driven command on its way.
    ///
    /// In buffered mode, lines lose their animation speed so that the eventual flush draws
    /// everything at once.
    pub fn emit(&mut self, mut cmd: Command) {
        match (self.mode(), self.sink.as_mut()) {
            (Mode::Buffered, _) => {
                if let Command::Line { speed, .. } = &mut cmd {
                    *speed = INSTANT;
                }
                self.queue.push(cmd);
            }
            (Mode::Immediate, Some(sink)) => sink.send(cmd),
            (Mode::Immediate, None) => self.queue.push(cmd),
        }
    }

    /// Switches tracer mode.
    ///
    /// Leaving buffered mode delivers whatever was buffered before anything else happens. The
    /// surface is then told about the new tracer setting.
    pub fn tracer(&mut self, n: i64, delay: Option<f64>) {
        log::debug!("tracer {n} (delay {delay:?}), {} queued", self.queue.len());
        self.tracer = TracerState { n, delay };
        if n != 0 {
            self.flush();
        }
        self.signal(Command::Tracer { n, delay });
    }

    /// Delivers everything buffered, whatever the mode. Does nothing if nothing is buffered;
    /// otherwise the flushed batch is followed by an `update` marker.
    pub fn update(&mut self) -> usize {
        let count = self.flush();
        if count > 0 {
            self.signal(Command::Update);
        }
        count
    }

    /// Forgets anything buffered and goes back to immediate mode, without telling anyone.
    pub fn restart(&mut self) {
        let dropped = self.queue.discard();
        if dropped > 0 {
            log::debug!("discarding {dropped} buffered commands");
        }
        self.tracer = TracerState::default();
    }

    fn flush(&mut self) -> usize {
        match self.sink.as_mut() {
            Some(sink) => self.queue.flush_into(sink.as_mut()),
            None => 0,
        }
    }

    /// Sends `cmd` past the buffer, whatever the mode. It still waits for a sink to exist.
    pub fn signal(&mut self, cmd: Command) {
        match self.sink.as_mut() {
            Some(sink) => sink.send(cmd),
            None => self.queue.push(cmd),
        }
    }
}
