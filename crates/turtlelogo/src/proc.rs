use futures::{future::LocalBoxFuture, FutureExt};
use turtlebox_host::{Arity, Callable, Stream};

use crate::typ::{Env, EvalError, EvalResult, Expr, ExprKind, ProcExpr, Span};

pub trait Proc {
    fn call<'a>(&'a self, args: Vec<Expr>, env: &'a mut Env) -> LocalBoxFuture<'a, EvalResult>;

    /// How many inputs this procedure takes. Without parentheses it always gets `min` of them.
    fn arity(&self) -> Arity;

    fn name(&self) -> &str;
}

/// A procedure defined with `to`.
#[derive(Clone, Debug, PartialEq)]
pub struct UserProc {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

impl Proc for UserProc {
    fn call<'a>(&'a self, args: Vec<Expr>, env: &'a mut Env) -> LocalBoxFuture<'a, EvalResult> {
        async move {
            env.push_frame();
            for (param, arg) in self.params.iter().zip(args) {
                env.def_local(param, arg);
            }
            let ret = self.body.eval(env).await;
            env.pop_frame();
            ret
        }
        .boxed_local()
    }

    fn arity(&self) -> Arity {
        Arity::exactly(self.params.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A procedure the host registered, usually one that drives a turtle.
pub struct HostProc {
    callable: Callable,
}

impl HostProc {
    pub fn new(callable: Callable) -> HostProc {
        HostProc { callable }
    }
}

impl Proc for HostProc {
    fn call<'a>(&'a self, args: Vec<Expr>, _env: &'a mut Env) -> LocalBoxFuture<'a, EvalResult> {
        let span = args
            .iter()
            .map(|arg| arg.span)
            .reduce(|a, b| a.union(b))
            .unwrap_or_default();
        let values = args.iter().map(Expr::to_value).collect();
        let ret = (self.callable.f)(values);
        async move {
            match ret.await {
                Ok(val) => Ok(val.map(|v| Expr::from_value(v, span))),
                Err(message) => Err(EvalError::Host {
                    proc: self.callable.name.clone(),
                    message,
                }),
            }
        }
        .boxed_local()
    }

    fn arity(&self) -> Arity {
        self.callable.arity
    }

    fn name(&self) -> &str {
        &self.callable.name
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    Make,
    Sum,
    Prod,
    Word,
    If,
    Repeat,
    Print,
    Show,
    ReadWord,
}

const MANY: usize = usize::MAX;

const BUILTINS: &[(&str, Builtin)] = &[
    ("make", Builtin::Make),
    ("sum", Builtin::Sum),
    ("prod", Builtin::Prod),
    ("product", Builtin::Prod),
    ("word", Builtin::Word),
    ("if", Builtin::If),
    ("repeat", Builtin::Repeat),
    ("print", Builtin::Print),
    ("pr", Builtin::Print),
    ("show", Builtin::Show),
    ("readword", Builtin::ReadWord),
    ("rw", Builtin::ReadWord),
];

impl Builtin {
    fn arity(self) -> Arity {
        match self {
            Builtin::Make | Builtin::Repeat => Arity::exactly(2),
            Builtin::Sum | Builtin::Prod | Builtin::Word => Arity::between(2, MANY),
            Builtin::If => Arity::between(2, 3),
            Builtin::Print | Builtin::Show => Arity::between(1, MANY),
            Builtin::ReadWord => Arity::between(0, 1),
        }
    }
}

pub struct BuiltinProc {
    name: &'static str,
    builtin: Builtin,
}

pub fn add_builtins(env: &mut Env) {
    for &(name, builtin) in BUILTINS {
        env.def_proc(ProcExpr::new(BuiltinProc { name, builtin }));
    }
}

impl BuiltinProc {
    fn bad(&self, arg: &Expr) -> EvalError {
        EvalError::BadArg {
            proc: self.name.to_owned(),
            arg: arg.clone(),
        }
    }

    fn nums(&self, args: &[Expr]) -> Result<Vec<f64>, EvalError> {
        args.iter()
            .map(|arg| arg.as_num().ok_or_else(|| self.bad(arg)))
            .collect()
    }

    fn list<'e>(&self, arg: &'e Expr) -> Result<&'e Expr, EvalError> {
        match arg.e {
            ExprKind::List(_) => Ok(arg),
            _ => Err(self.bad(arg)),
        }
    }
}

fn span_of(args: &[Expr]) -> Span {
    args.iter()
        .map(|arg| arg.span)
        .reduce(|a, b| a.union(b))
        .unwrap_or_default()
}

// `print` drops the outer brackets of a list; `show` keeps them.
fn print_text(args: &[Expr], brackets: bool) -> String {
    let mut ret = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            ret.push(' ');
        }
        match &arg.e {
            ExprKind::List(items) if !brackets => {
                let inner: Vec<String> = items.iter().map(Expr::to_string).collect();
                ret.push_str(&inner.join(" "));
            }
            _ => ret.push_str(&arg.to_string()),
        }
    }
    ret.push('\n');
    ret
}

impl Proc for BuiltinProc {
    fn call<'a>(&'a self, args: Vec<Expr>, env: &'a mut Env) -> LocalBoxFuture<'a, EvalResult> {
        async move {
            let span = span_of(&args);
            let ret = match self.builtin {
                Builtin::Make => {
                    let ExprKind::Word(name) = &args[0].e else {
                        return Err(self.bad(&args[0]));
                    };
                    env.set_var(&name.to_lowercase(), args[1].clone());
                    None
                }
                Builtin::Sum => Some(ExprKind::Num(self.nums(&args)?.into_iter().sum())),
                Builtin::Prod => Some(ExprKind::Num(self.nums(&args)?.into_iter().product())),
                Builtin::Word => {
                    let mut word = String::new();
                    for arg in &args {
                        match arg.e {
                            ExprKind::List(_) => return Err(self.bad(arg)),
                            _ => word.push_str(&arg.to_string()),
                        }
                    }
                    Some(ExprKind::Word(word))
                }
                Builtin::If => {
                    let cond = args[0].as_bool().ok_or_else(|| self.bad(&args[0]))?;
                    let branch = if cond { args.get(1) } else { args.get(2) };
                    match branch {
                        Some(body) => {
                            return self.list(body)?.eval(env).await;
                        }
                        None => None,
                    }
                }
                Builtin::Repeat => {
                    let count = args[0]
                        .as_num()
                        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                        .ok_or_else(|| self.bad(&args[0]))?;
                    let body = self.list(&args[1])?;
                    for _ in 0..(count as u64) {
                        if let Some(val) = body.eval(env).await? {
                            return Err(EvalError::UnusedVal { val });
                        }
                    }
                    None
                }
                Builtin::Print => {
                    env.io.write(Stream::Stdout, &print_text(&args, false));
                    None
                }
                Builtin::Show => {
                    env.io.write(Stream::Stdout, &print_text(&args, true));
                    None
                }
                Builtin::ReadWord => {
                    let read = env.io.input.clone().ok_or(EvalError::NoInput)?;
                    let prompt = args.iter().map(Expr::to_value).collect();
                    let line = read(prompt).await.map_err(|message| EvalError::Host {
                        proc: self.name.to_owned(),
                        message,
                    })?;
                    let text = line.map(|v| v.to_text()).unwrap_or_default();
                    Some(ExprKind::Word(text))
                }
            };
            Ok(ret.map(|e| Expr { e, span }))
        }
        .boxed_local()
    }

    fn arity(&self) -> Arity {
        self.builtin.arity()
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use futures::executor::block_on;
    use turtlebox_host::Value;

    use super::*;
    use crate::typ::Io;

    fn word(w: &str) -> Expr {
        Expr::new(ExprKind::Word(w.into()), Span::default())
    }

    fn num(x: f64) -> Expr {
        Expr::new(ExprKind::Num(x), Span::default())
    }

    fn call(env: &mut Env, name: &str, args: Vec<Expr>) -> EvalResult {
        let proc = env.lookup_proc(name).unwrap();
        block_on(proc.inner.call(args, env))
    }

    #[test]
    fn arithmetic_builtins() {
        let mut env = Env::default();
        let ret = call(&mut env, "sum", vec![num(1.0), num(2.0), word("3")]).unwrap();
        assert_eq!(ret.unwrap().e, ExprKind::Num(6.0));
        let ret = call(&mut env, "product", vec![num(2.0), num(5.0)]).unwrap();
        assert_eq!(ret.unwrap().e, ExprKind::Num(10.0));
        assert!(matches!(
            call(&mut env, "sum", vec![num(1.0), word("x")]),
            Err(EvalError::BadArg { .. })
        ));
    }

    #[test]
    fn make_and_word() {
        let mut env = Env::default();
        call(&mut env, "make", vec![word("X"), num(3.0)]).unwrap();
        assert_eq!(env.lookup_var("x").unwrap().e, ExprKind::Num(3.0));
        let ret = call(&mut env, "word", vec![word("ab"), num(3.0)]).unwrap();
        assert_eq!(ret.unwrap().e, ExprKind::Word("ab3".into()));
        assert!(call(&mut env, "make", vec![num(1.0), num(3.0)]).is_err());
    }

    #[test]
    fn print_and_show() {
        let out = Rc::new(RefCell::new(String::new()));
        let sink = Rc::clone(&out);
        let mut env = Env::new(Io {
            stdout: Some(Rc::new(move |s: &str| sink.borrow_mut().push_str(s))),
            ..Io::default()
        });
        let list = Expr::new(ExprKind::List(vec![num(1.0), word("a")]), Span::default());
        call(&mut env, "print", vec![list.clone(), word("b")]).unwrap();
        call(&mut env, "show", vec![list]).unwrap();
        assert_eq!(*out.borrow(), "1 a b\n[1 a]\n");
    }

    #[test]
    fn readword_uses_the_input_hook() {
        let mut env = Env::default();
        assert!(matches!(
            call(&mut env, "rw", vec![]),
            Err(EvalError::NoInput)
        ));

        // Echoes the prompt back, if there is one.
        env.io.input = Some(Rc::new(|args: Vec<Value>| {
            let answer = args.first().map(Value::to_text).unwrap_or_else(|| "hello".into());
            futures::future::ready(Ok::<_, String>(Some(Value::Text(answer)))).boxed_local()
        }));
        let ret = call(&mut env, "readword", vec![]).unwrap();
        assert_eq!(ret.unwrap().e, ExprKind::Word("hello".into()));
        let ret = call(&mut env, "readword", vec![word("who?")]).unwrap();
        assert_eq!(ret.unwrap().e, ExprKind::Word("who?".into()));
    }

    #[test]
    fn user_procs_get_their_own_frame() {
        let mut env = Env::default();
        let body = Expr::new(
            ExprKind::List(vec![Expr::new(ExprKind::Var("n".into()), Span::default())]),
            Span::default(),
        );
        env.def_proc(ProcExpr::new(UserProc {
            name: "ident".into(),
            params: vec!["n".into()],
            body,
        }));
        let ret = call(&mut env, "ident", vec![num(4.0)]).unwrap();
        assert_eq!(ret.unwrap().e, ExprKind::Num(4.0));
        assert!(env.lookup_var("n").is_none());
    }
}
