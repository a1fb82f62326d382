use std::{
    cell::RefCell,
    io::{BufRead, Write},
    path::PathBuf,
    rc::Rc,
};

use anyhow::Context;
use clap::Parser;
use turtlebox_host::{Config, EventSink, Host, Inbound, InputPolicy, Outbound, ScriptRuntime};
use turtlelogo::LogoRuntime;

#[derive(Parser, Debug)]
struct Args {
    /// A TOML file with canvas defaults, status texts, and the input policy.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Answer overlapping input requests in order, instead of only the most recent one.
    #[arg(long)]
    queue_input: bool,
}

/// Writes each event as one line of JSON.
struct JsonLines<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> JsonLines<W> {
    fn new(out: W) -> Self {
        JsonLines {
            out: RefCell::new(out),
        }
    }

    fn write(&self, msg: &Outbound) -> anyhow::Result<()> {
        let json = msg.to_json()?;
        let mut out = self.out.borrow_mut();
        writeln!(out, "{json}")?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write> EventSink for JsonLines<W> {
    fn post(&self, msg: Outbound) {
        if let Err(e) = self.write(&msg) {
            log::error!("failed to send {msg:?}: {e}");
        }
    }
}

/// Feeds each line of `input` to the host until end of file. Lines that aren't messages are skipped.
fn serve<R: ScriptRuntime + 'static>(
    mut input: impl BufRead,
    host: &mut Host<R>,
) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = input
            .read_until(b'\n', &mut buf)
            .context("failed to read from stdin")?;
        if n == 0 {
            return Ok(());
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            let lossy = String::from_utf8_lossy(&buf);
            log::warn!("ignoring a line that isn't UTF-8: {lossy:?}");
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        match Inbound::parse(line) {
            Ok(msg) => host.handle(msg),
            Err(e) => log::warn!("ignoring malformed message {line:?}: {e}"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.queue_input {
        config.input_policy = InputPolicy::Queue;
    }

    let events = Rc::new(JsonLines::new(std::io::stdout()));
    let mut host = Host::new(config, events, || Ok(LogoRuntime::new()));

    serve(std::io::stdin().lock(), &mut host)?;
    log::info!("stdin closed, exiting");
    Ok(())
}
