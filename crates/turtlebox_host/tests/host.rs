//! Protocol flows through a [`Host`], driven by a toy line-at-a-time runtime.
//!
//! Each line of a toy script is one of:
//! - `print words...` / `write words...` / `warn words...` (stdout with newline, stdout without,
//!   stderr with newline),
//! - `await input(prompt)` (read a line of input and print `got <answer>`),
//! - `fail message`,
//! - or a call to a registered host function, with whitespace-separated arguments.
//!
//! The toy can't read input by itself, so it relies on the host rewriting `input(` calls.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use futures::FutureExt;
use serde_json::json;
use turtlebox::Command;
use turtlebox_host::{
    Callable, Config, Host, HostFn, Inbound, InputPolicy, InputRewrite, Lifecycle, Mailbox,
    OutputHook, Outbound, RunFuture, ScriptRuntime, Stream, Value,
};

#[derive(Default)]
struct ToyState {
    globals: HashMap<String, Callable>,
    input: Option<HostFn>,
    stdout: Option<OutputHook>,
    stderr: Option<OutputHook>,
    sources: Vec<String>,
}

#[derive(Clone, Default)]
struct Toy(Rc<RefCell<ToyState>>);

fn parse_arg(word: &str) -> Value {
    word.parse()
        .map(Value::Num)
        .unwrap_or_else(|_| Value::Text(word.to_owned()))
}

async fn exec_line(state: Rc<RefCell<ToyState>>, line: String) -> Result<(), String> {
    let say = |hook: Option<OutputHook>, text: &str| {
        if let Some(hook) = hook {
            hook(text);
        }
    };
    let (cmd, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
    match cmd {
        "" => {}
        "print" => say(state.borrow().stdout.clone(), &format!("{rest}\n")),
        "write" => say(state.borrow().stdout.clone(), rest),
        "warn" => say(state.borrow().stderr.clone(), &format!("{rest}\n")),
        "fail" => return Err(rest.to_owned()),
        "await" => {
            let prompt = rest
                .strip_prefix("input(")
                .and_then(|r| r.strip_suffix(')'))
                .ok_or("toy can only await input")?;
            let read = state.borrow().input.clone().ok_or("no input hook")?;
            let answer = read(vec![Value::Text(prompt.to_owned())]).await?;
            let answer = answer.map(|v| v.to_text()).unwrap_or_default();
            say(state.borrow().stdout.clone(), &format!("got {answer}\n"));
        }
        name => {
            let f = state
                .borrow()
                .globals
                .get(name)
                .map(|c| c.f.clone())
                .ok_or_else(|| format!("toy doesn't know how to {name}"))?;
            f(rest.split_whitespace().map(parse_arg).collect()).await?;
        }
    }
    Ok(())
}

impl ScriptRuntime for Toy {
    fn register(&mut self, callable: Callable) {
        self.0
            .borrow_mut()
            .globals
            .insert(callable.name.clone(), callable);
    }

    fn replace_input(&mut self, read: HostFn) {
        self.0.borrow_mut().input = Some(read);
    }

    fn set_output(&mut self, stream: Stream, hook: OutputHook) {
        let mut state = self.0.borrow_mut();
        match stream {
            Stream::Stdout => state.stdout = Some(hook),
            Stream::Stderr => state.stderr = Some(hook),
        }
    }

    fn input_rewrite(&self) -> Option<InputRewrite> {
        InputRewrite::new("input", "await ").ok()
    }

    fn run(&mut self, source: &str) -> RunFuture {
        self.0.borrow_mut().sources.push(source.to_owned());
        let state = Rc::clone(&self.0);
        let lines: Vec<String> = source.lines().map(str::to_owned).collect();
        async move {
            for line in lines {
                exec_line(Rc::clone(&state), line).await?;
            }
            Ok(())
        }
        .boxed_local()
    }
}

fn host_with(config: Config) -> (Host<Toy>, Mailbox, Toy) {
    let mailbox = Mailbox::default();
    let toy = Toy::default();
    let runtime = toy.clone();
    let host = Host::new(config, Rc::new(mailbox.clone()), move || Ok(runtime));
    (host, mailbox, toy)
}

fn host() -> (Host<Toy>, Mailbox, Toy) {
    host_with(Config::default())
}

fn run(code: &str) -> Inbound {
    Inbound::Run {
        code: Some(code.to_owned()),
    }
}

fn respond(text: serde_json::Value) -> Inbound {
    Inbound::InputResponse { text }
}

fn status(text: &str) -> Outbound {
    Outbound::Status { text: text.into() }
}

fn stdout(text: &str) -> Outbound {
    Outbound::Stdout { text: text.into() }
}

fn home_pose() -> Outbound {
    Outbound::CanvasCmd {
        cmd: Command::TurtlePose {
            x: 0.0,
            y: 0.0,
            heading: 0.0,
            visible: true,
            color: "#00ff66".into(),
        },
    }
}

/// What every run starts with, once the host is up.
fn fresh_canvas() -> Vec<Outbound> {
    vec![
        status("Running…"),
        Outbound::CanvasCmd {
            cmd: Command::Clear,
        },
        Outbound::CanvasCmd {
            cmd: Command::Background {
                color: "#111111".into(),
            },
        },
        home_pose(),
    ]
}

fn canvas(events: &[Outbound]) -> Vec<&Command> {
    events
        .iter()
        .filter_map(|e| match e {
            Outbound::CanvasCmd { cmd } => Some(cmd),
            _ => None,
        })
        .collect()
}

#[test]
fn init_is_idempotent() {
    let (mut host, mailbox, _) = host();
    assert_eq!(host.lifecycle(), Lifecycle::Uninitialized);
    host.handle(Inbound::Init);
    assert_eq!(
        mailbox.take(),
        vec![status("Loading runtime…"), home_pose(), Outbound::Ready]
    );
    assert_eq!(host.lifecycle(), Lifecycle::Ready);

    host.handle(Inbound::Init);
    assert!(mailbox.is_empty());
}

#[test]
fn run_initializes_then_draws() {
    let (mut host, mailbox, _) = host();
    host.handle(run("fd 100"));

    let mut expected = vec![status("Loading runtime…"), home_pose(), Outbound::Ready];
    expected.extend(fresh_canvas());
    expected.extend([
        Outbound::CanvasCmd {
            cmd: Command::Line {
                x1: 0.0,
                y1: 0.0,
                x2: 100.0,
                y2: 0.0,
                color: "#00ff66".into(),
                width: 2.0,
                speed: 0,
            },
        },
        Outbound::CanvasCmd {
            cmd: Command::TurtlePose {
                x: 100.0,
                y: 0.0,
                heading: 0.0,
                visible: true,
                color: "#00ff66".into(),
            },
        },
        Outbound::Done,
    ]);
    assert_eq!(mailbox.take(), expected);
    assert_eq!(host.lifecycle(), Lifecycle::Ready);
}

#[test]
fn every_run_gets_a_fresh_canvas() {
    let (mut host, mailbox, _) = host();
    host.handle(Inbound::Init);
    host.handle(run("fd 10\nlt 90\nht"));
    mailbox.take();

    host.handle(run(""));
    let mut expected = fresh_canvas();
    expected.push(Outbound::Done);
    assert_eq!(mailbox.take(), expected);
}

#[test]
fn missing_code_is_an_empty_script() {
    let (mut host, mailbox, toy) = host();
    host.handle(Inbound::Init);
    mailbox.take();
    host.handle(Inbound::Run { code: None });
    assert_eq!(mailbox.take().last(), Some(&Outbound::Done));
    assert_eq!(toy.0.borrow().sources, vec![String::new()]);
}

#[test]
fn output_is_line_batched() {
    let (mut host, mailbox, _) = host();
    host.handle(Inbound::Init);
    mailbox.take();
    host.handle(run("write hel\nprint lo\nwarn careful\nwrite trailing"));
    let events = mailbox.take();
    assert_eq!(
        events[fresh_canvas().len()..],
        [
            stdout("hello"),
            Outbound::Stderr {
                text: "careful".into()
            },
            stdout("trailing"),
            Outbound::Done,
        ]
    );
}

#[test]
fn input_round_trip() {
    let (mut host, mailbox, toy) = host();
    host.handle(Inbound::Init);
    mailbox.take();

    host.handle(run("write partial\nname = input(who?)"));
    assert_eq!(
        toy.0.borrow().sources.last().map(String::as_str),
        Some("write partial\nname = await input(who?)")
    );
    // The toy only understands a bare `await input(..)`, so that line fails.
    assert!(matches!(mailbox.take().last(), Some(Outbound::Error { .. })));

    host.handle(run("input(who?)"));
    let events = mailbox.take();
    assert_eq!(
        events.last(),
        Some(&Outbound::InputRequest {
            prompt: "who?".into()
        })
    );
    assert_eq!(host.lifecycle(), Lifecycle::Running);
    assert_eq!(host.pending_inputs(), 1);

    host.handle(respond(json!("Ada")));
    assert_eq!(mailbox.take(), vec![stdout("got Ada"), Outbound::Done]);
    assert_eq!(host.pending_inputs(), 0);
    assert_eq!(host.lifecycle(), Lifecycle::Ready);
}

#[test]
fn partial_output_is_flushed_before_asking() {
    let (mut host, mailbox, _) = host();
    host.handle(Inbound::Init);
    mailbox.take();
    host.handle(run("write Your name: \ninput()"));
    let events = mailbox.take();
    assert_eq!(
        events[fresh_canvas().len()..],
        [
            stdout("Your name: "),
            Outbound::InputRequest {
                prompt: String::new()
            },
        ]
    );
}

#[test]
fn responses_are_coerced_to_text() {
    let (mut host, mailbox, _) = host();
    host.handle(run("input(n)\ninput(flag)\ninput(nothing)"));
    mailbox.take();

    host.handle(respond(json!(42)));
    assert_eq!(
        mailbox.take(),
        vec![
            stdout("got 42"),
            Outbound::InputRequest {
                prompt: "flag".into()
            }
        ]
    );
    host.handle(respond(json!(true)));
    mailbox.take();
    host.handle(respond(json!(null)));
    assert_eq!(mailbox.take(), vec![stdout("got "), Outbound::Done]);
}

#[test]
fn unsolicited_responses_are_ignored() {
    let (mut host, mailbox, _) = host();
    host.handle(respond(json!("hello?")));
    assert!(mailbox.is_empty());
    assert_eq!(host.lifecycle(), Lifecycle::Uninitialized);

    host.handle(Inbound::Init);
    mailbox.take();
    host.handle(respond(json!("hello?")));
    assert!(mailbox.is_empty());
}

#[test]
fn failures_skip_done() {
    let (mut host, mailbox, _) = host();
    host.handle(Inbound::Init);
    mailbox.take();

    host.handle(run("print before\nfail boom\nprint after"));
    let events = mailbox.take();
    assert_eq!(
        events[fresh_canvas().len()..],
        [
            stdout("before"),
            Outbound::Error {
                text: "boom".into()
            }
        ]
    );

    host.handle(run("color 1 2"));
    assert_eq!(
        mailbox.take().last(),
        Some(&Outbound::Error {
            text: "color: bad color argument".into()
        })
    );

    // The session survives.
    host.handle(run("print still here"));
    assert_eq!(
        mailbox.take()[fresh_canvas().len()..],
        [stdout("still here"), Outbound::Done]
    );
}

#[test]
fn init_failure_is_permanent() {
    let mailbox = Mailbox::default();
    let mut host: Host<Toy> = Host::new(Config::default(), Rc::new(mailbox.clone()), || {
        Err(anyhow::anyhow!("no wasm"))
    });
    host.handle(Inbound::Init);
    let error = Outbound::Error {
        text: "failed to start the script runtime: no wasm".into(),
    };
    assert_eq!(
        mailbox.take(),
        vec![status("Loading runtime…"), error.clone()]
    );
    assert_eq!(host.lifecycle(), Lifecycle::Failed);

    host.handle(run("fd 10"));
    assert_eq!(mailbox.take(), vec![error]);
    assert!(host.screen().is_none());
}

#[test]
fn buffered_drawing() {
    let (mut host, mailbox, _) = host();
    host.handle(Inbound::Init);
    mailbox.take();

    host.handle(run("speed 5\ntracer 0\nfd 10\nfd 10\nfd 10\nupdate"));
    let events = mailbox.take();
    let cmds = canvas(&events);
    let after_tracer = cmds
        .iter()
        .position(|c| **c == Command::Tracer { n: 0, delay: None })
        .unwrap();
    let batch = &cmds[after_tracer + 1..];
    assert_eq!(batch.len(), 7);
    let lines: Vec<_> = batch
        .iter()
        .filter_map(|c| match c {
            Command::Line { x2, speed, .. } => Some((*x2, *speed)),
            _ => None,
        })
        .collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|(_, speed)| *speed == 0));
    assert!(lines[0].0 < lines[1].0 && lines[1].0 < lines[2].0);
    assert_eq!(batch.last(), Some(&&Command::Update));
}

#[test]
fn buffer_left_over_is_dropped_by_the_next_run() {
    let (mut host, mailbox, _) = host();
    host.handle(run("tracer 0\nfd 10"));
    let screen = host.screen().unwrap();
    assert_eq!(screen.borrow().batcher().queue().len(), 2);
    mailbox.take();

    host.handle(run(""));
    assert!(screen.borrow().batcher().queue().is_empty());
    let mut expected = fresh_canvas();
    expected.push(Outbound::Done);
    assert_eq!(mailbox.take(), expected);
}

#[test]
fn overlapping_input_requests_keep_only_the_latest() {
    let (mut host, mailbox, _) = host();
    host.handle(Inbound::Init);
    host.handle(run("input(first)\nprint first done"));
    host.handle(run("input(second)\nprint second done"));
    assert_eq!(host.pending_inputs(), 1);
    mailbox.take();

    host.handle(respond(json!("x")));
    assert_eq!(
        mailbox.take(),
        vec![stdout("got x"), stdout("second done"), Outbound::Done]
    );

    // The first run never hears back.
    host.handle(respond(json!("y")));
    assert!(mailbox.is_empty());
    assert_eq!(host.lifecycle(), Lifecycle::Running);
}

#[test]
fn queued_input_requests_are_answered_in_order() {
    let config = Config {
        input_policy: InputPolicy::Queue,
        ..Config::default()
    };
    let (mut host, mailbox, _) = host_with(config);
    host.handle(run("input(first)"));
    host.handle(run("input(second)"));
    assert_eq!(host.pending_inputs(), 2);
    mailbox.take();

    host.handle(respond(json!("one")));
    assert_eq!(mailbox.take(), vec![stdout("got one"), Outbound::Done]);
    host.handle(respond(json!("two")));
    assert_eq!(mailbox.take(), vec![stdout("got two"), Outbound::Done]);
    assert_eq!(host.lifecycle(), Lifecycle::Ready);
}

#[test]
fn configured_defaults() {
    let config = Config::from_toml(
        r##"
[canvas]
pen_color = "white"
background = "black"

[status]
loading = "warming up"
running = "go"
"##,
    )
    .unwrap();
    let (mut host, mailbox, _) = host_with(config);
    host.handle(run(""));
    let events = mailbox.take();
    assert_eq!(events[0], status("warming up"));
    assert!(events.contains(&status("go")));
    assert!(events.contains(&Outbound::CanvasCmd {
        cmd: Command::Background {
            color: "black".into()
        }
    }));
    assert!(matches!(
        canvas(&events).last(),
        Some(Command::TurtlePose { color, .. }) if color == "white"
    ));
}
