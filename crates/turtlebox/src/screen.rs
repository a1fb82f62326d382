use std::collections::BTreeMap;

use crate::{Batcher, Command, CommandSink, Defaults, Pose, Turtle, TurtleError, TurtleRef};

/// The name of the turtle that every session starts with.
pub const DEFAULT_TURTLE: &str = "default";

/// All the turtles in a session, plus the one command stream they share.
///
/// Scripts mostly talk to the "current" turtle, which is the default one unless they've asked
/// for another.
#[derive(Debug)]
pub struct Screen {
    defaults: Defaults,
    out: Batcher,
    turtles: BTreeMap<String, Turtle>,
    current: String,
}

impl Screen {
    pub fn new(defaults: Defaults) -> Screen {
        let mut out = Batcher::new();
        let mut turtles = BTreeMap::new();
        turtles.insert(DEFAULT_TURTLE.to_owned(), Turtle::new(&defaults, &mut out));
        Screen {
            defaults,
            out,
            turtles,
            current: DEFAULT_TURTLE.to_owned(),
        }
    }

    pub fn with_sink(defaults: Defaults, sink: Box<dyn CommandSink>) -> Screen {
        let mut screen = Screen::new(defaults);
        screen.attach(sink);
        screen
    }

    /// Connects the rendering surface. Anything queued while nobody was listening is delivered
    /// now (unless we're buffering).
    pub fn attach(&mut self, sink: Box<dyn CommandSink>) {
        self.out.attach(sink);
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn batcher(&self) -> &Batcher {
        &self.out
    }

    pub fn current_name(&self) -> &str {
        &self.current
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.turtles.keys().map(String::as_str)
    }

    /// The turtle that unqualified operations apply to.
    pub fn current(&mut self) -> TurtleRef<'_> {
        let Screen {
            defaults,
            out,
            turtles,
            current,
        } = self;
        turtles
            .entry(current.clone())
            .or_insert_with(|| Turtle::new(defaults, out))
            .on(out)
    }

    pub fn turtle(&mut self, name: &str) -> Result<TurtleRef<'_>, TurtleError> {
        match self.turtles.get_mut(name) {
            Some(turtle) => Ok(turtle.on(&mut self.out)),
            None => Err(TurtleError::UnknownTurtle(name.to_owned())),
        }
    }

    pub fn pose(&self, name: &str) -> Option<&Pose> {
        self.turtles.get(name).map(Turtle::pose)
    }

    /// Adds a fresh turtle (which announces itself), replacing any turtle of the same name.
    pub fn spawn(&mut self, name: &str) {
        log::debug!("new turtle {name:?}");
        let turtle = Turtle::new(&self.defaults, &mut self.out);
        self.turtles.insert(name.to_owned(), turtle);
    }

    pub fn select(&mut self, name: &str) -> Result<(), TurtleError> {
        if !self.turtles.contains_key(name) {
            return Err(TurtleError::UnknownTurtle(name.to_owned()));
        }
        self.current = name.to_owned();
        Ok(())
    }

    /// Wipes the canvas, restores the default background, and replaces the default turtle.
    ///
    /// Other turtles keep their poses.
    pub fn reset(&mut self) {
        self.out.emit(Command::Clear);
        self.out.emit(Command::Background {
            color: self.defaults.background.clone(),
        });
        let turtle = Turtle::new(&self.defaults, &mut self.out);
        self.turtles.insert(DEFAULT_TURTLE.to_owned(), turtle);
    }

    /// Gets ready for a new script: forgets buffered commands and extra turtles, then resets.
    pub fn restart(&mut self) {
        self.out.restart();
        self.turtles.retain(|name, _| name == DEFAULT_TURTLE);
        self.current = DEFAULT_TURTLE.to_owned();
        self.reset();
    }

    pub fn tracer(&mut self, n: i64, delay: Option<f64>) {
        self.out.tracer(n, delay);
    }

    pub fn update(&mut self) -> usize {
        self.out.update()
    }

    pub fn bgcolor(&mut self, color: String) {
        self.current().bgcolor(color);
    }

    pub fn clearscreen(&mut self) {
        self.current().clear();
    }
}
