use futures::{future, FutureExt};
use turtlebox_host::{Callable, HostFn, OutputHook, RunFuture, ScriptRuntime, Stream};

use crate::{
    parse,
    proc::HostProc,
    typ::{Env, Io, ProcExpr},
};

/// A Logo interpreter that a [`turtlebox_host::Host`] can drive.
///
/// Every run starts from a clean slate: variables and procedures from one run aren't visible in
/// the next. Host functions shadow builtins of the same name, and procedures defined with `to`
/// shadow both.
#[derive(Default)]
pub struct LogoRuntime {
    host_procs: Vec<Callable>,
    io: Io,
}

impl LogoRuntime {
    pub fn new() -> LogoRuntime {
        LogoRuntime::default()
    }

    fn env(&self) -> Env {
        let mut env = Env::new(self.io.clone());
        for callable in &self.host_procs {
            env.def_proc(ProcExpr::new(HostProc::new(callable.clone())));
        }
        env
    }
}

impl ScriptRuntime for LogoRuntime {
    fn register(&mut self, callable: Callable) {
        log::trace!("registering {}", callable.name);
        self.host_procs.push(callable);
    }

    fn replace_input(&mut self, read: HostFn) {
        self.io.input = Some(read);
    }

    fn set_output(&mut self, stream: Stream, hook: OutputHook) {
        match stream {
            Stream::Stdout => self.io.stdout = Some(hook),
            Stream::Stderr => self.io.stderr = Some(hook),
        }
    }

    fn run(&mut self, source: &str) -> RunFuture {
        let prog = match parse::program(source) {
            Ok(prog) => prog,
            Err(e) => return future::ready(Err(e.to_string())).boxed_local(),
        };
        let mut env = self.env();
        async move {
            match prog.eval(&mut env).await {
                Ok(None) => Ok(()),
                Ok(Some(val)) => {
                    env.io.write(
                        Stream::Stderr,
                        &format!("Warning: program evaluated to an unexpected value: {val}\n"),
                    );
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            }
        }
        .boxed_local()
    }
}
