use std::{collections::HashMap, rc::Rc};

use futures::{future::LocalBoxFuture, FutureExt};
use turtlebox_host::{Arity, HostFn, OutputHook, Stream, Value};

use crate::proc::Proc;

pub type EvalResult = Result<Option<Expr>, EvalError>;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn union(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<crate::parse::Span<'_>> for Span {
    fn from(sp: crate::parse::Span) -> Self {
        Span {
            start: sp.location_offset(),
            end: sp.location_offset() + sp.fragment().len(),
        }
    }
}

#[derive(Clone)]
pub struct ProcExpr {
    pub inner: Rc<dyn Proc>,
}

impl std::fmt::Debug for ProcExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "proc {}", self.name())
    }
}

impl PartialEq for ProcExpr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ProcExpr {
    pub fn new(proc: impl Proc + 'static) -> ProcExpr {
        ProcExpr {
            inner: Rc::new(proc),
        }
    }

    fn call<'a>(
        &'a self,
        args: Vec<Expr>,
        env: &'a mut Env,
    ) -> LocalBoxFuture<'a, EvalResult> {
        self.inner.call(args, env)
    }

    pub fn arity(&self) -> Arity {
        self.inner.arity()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
}

impl Op {
    pub fn priority(&self) -> Priority {
        match self {
            Op::Add | Op::Sub => Priority::Add,
            Op::Mul | Op::Div => Priority::Mul,
            Op::Eq | Op::Lt | Op::Gt => Priority::Cmp,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Gt => ">",
        }
    }

    pub fn eval(&self, lhs: &Expr, rhs: &Expr) -> Result<Expr, EvalError> {
        let span = lhs.span.union(rhs.span);
        if *self == Op::Eq {
            let same = match (lhs.as_num(), rhs.as_num()) {
                (Some(l), Some(r)) => l == r,
                _ => lhs.to_string() == rhs.to_string(),
            };
            return Ok(Expr {
                e: ExprKind::Bool(same),
                span,
            });
        }

        let l = lhs.as_num().ok_or_else(|| EvalError::BadOpArg {
            op: *self,
            arg: lhs.clone(),
        })?;
        let r = rhs.as_num().ok_or_else(|| EvalError::BadOpArg {
            op: *self,
            arg: rhs.clone(),
        })?;
        let e = match self {
            Op::Add => ExprKind::Num(l + r),
            Op::Sub => ExprKind::Num(l - r),
            Op::Mul => ExprKind::Num(l * r),
            Op::Div if r == 0.0 => return Err(EvalError::DivideByZero),
            Op::Div => ExprKind::Num(l / r),
            Op::Lt => ExprKind::Bool(l < r),
            Op::Gt => ExprKind::Bool(l > r),
            Op::Eq => ExprKind::Bool(l == r),
        };
        Ok(Expr { e, span })
    }
}

impl TryFrom<char> for Op {
    type Error = ();

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Ok(match value {
            '+' => Op::Add,
            '-' => Op::Sub,
            '*' => Op::Mul,
            '/' => Op::Div,
            '=' => Op::Eq,
            '<' => Op::Lt,
            '>' => Op::Gt,
            _ => Err(())?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Num(f64),
    Bool(bool),
    Var(String),
    Word(String),
    Proc(ProcExpr),
    DefProc(ProcExpr),
    Op(Op),
    List(Vec<Expr>),
    /// A parenthesized list, which is allowed to pass extra inputs to the procedure it starts with.
    Group(Vec<Expr>),
    Quote(Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub e: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(e: ExprKind, span: Span) -> Expr {
        Expr { e, span }
    }

    /// Numbers, and words that look like numbers.
    pub fn as_num(&self) -> Option<f64> {
        match &self.e {
            ExprKind::Num(x) => Some(*x),
            ExprKind::Word(w) => w.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.e {
            ExprKind::Bool(b) => Some(*b),
            ExprKind::Word(w) if w.eq_ignore_ascii_case("true") => Some(true),
            ExprKind::Word(w) if w.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// The data this expression stands for, for handing to the host.
    pub fn to_value(&self) -> Value {
        match &self.e {
            ExprKind::Num(x) => Value::Num(*x),
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Word(w) => Value::Text(w.clone()),
            ExprKind::List(items) => Value::List(items.iter().map(Expr::to_value).collect()),
            ExprKind::Quote(e) => e.to_value(),
            _ => Value::Text(self.to_string()),
        }
    }

    pub fn from_value(v: Value, span: Span) -> Expr {
        let e = match v {
            Value::Num(x) => ExprKind::Num(x),
            Value::Bool(b) => ExprKind::Bool(b),
            Value::Text(s) => ExprKind::Word(s),
            Value::List(items) => ExprKind::List(
                items
                    .into_iter()
                    .map(|item| Expr::from_value(item, span))
                    .collect(),
            ),
        };
        Expr { e, span }
    }
}

/// Where a script's output goes, and where its input comes from.
#[derive(Clone, Default)]
pub struct Io {
    pub stdout: Option<OutputHook>,
    pub stderr: Option<OutputHook>,
    pub input: Option<HostFn>,
}

impl Io {
    pub fn write(&self, stream: Stream, text: &str) {
        let hook = match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        };
        match hook {
            Some(hook) => hook(text),
            None => log::debug!("no {stream:?} hook, dropping {text:?}"),
        }
    }
}

pub struct Env {
    pub globals: Frame,
    // Procedure calls in progress, innermost last.
    pub stack: Vec<Frame>,
    pub io: Io,
    // How many lists and groups are being evaluated right now.
    depth: usize,
}

/// Evaluation nests this deep at most before giving up with [`EvalError::TooDeep`].
pub const MAX_DEPTH: usize = 128;

impl Env {
    /// An environment with only the builtins defined.
    pub fn new(io: Io) -> Env {
        let mut ret = Env {
            globals: Frame::default(),
            stack: Vec::new(),
            io,
            depth: 0,
        };
        crate::proc::add_builtins(&mut ret);
        ret
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new(Io::default())
    }
}

#[derive(Default)]
pub struct Frame {
    vars: HashMap<String, Expr>,
    procs: HashMap<String, ProcExpr>,
}

impl Env {
    fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.stack.iter().rev().chain(std::iter::once(&self.globals))
    }

    pub fn lookup_proc(&self, name: &str) -> Option<ProcExpr> {
        self.frames().find_map(|frame| frame.procs.get(name).cloned())
    }

    pub fn lookup_var(&self, name: &str) -> Option<Expr> {
        self.frames().find_map(|frame| frame.vars.get(name).cloned())
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    pub fn push_frame(&mut self) {
        self.stack.push(Frame::default());
    }

    pub fn pop_frame(&mut self) {
        self.stack.pop();
    }

    /// Defines a variable in the innermost procedure call (or globally, if there isn't one).
    pub fn def_local(&mut self, name: &str, val: Expr) {
        let frame = self.stack.last_mut().unwrap_or(&mut self.globals);
        frame.vars.insert(name.to_owned(), val);
    }

    /// Updates the innermost variable called `name`, or makes a new global one.
    pub fn set_var(&mut self, name: &str, val: Expr) {
        let frame = match self
            .stack
            .iter_mut()
            .rev()
            .find(|frame| frame.vars.contains_key(name))
        {
            Some(frame) => frame,
            None => &mut self.globals,
        };
        frame.vars.insert(name.to_owned(), val);
    }

    /// Procedures are always global; a new one replaces any old one with the same name.
    pub fn def_proc(&mut self, proc: ProcExpr) {
        self.globals.procs.insert(proc.name().to_owned(), proc);
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn items(f: &mut std::fmt::Formatter<'_>, list: &[Expr]) -> std::fmt::Result {
            for (i, e) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{e}")?;
            }
            Ok(())
        }

        match &self.e {
            ExprKind::Num(x) => write!(f, "{x}"),
            ExprKind::Bool(x) => write!(f, "{x}"),
            ExprKind::Var(s) => write!(f, ":{s}"),
            ExprKind::Word(w) => f.write_str(w),
            ExprKind::Proc(p) => f.write_str(p.name()),
            ExprKind::DefProc(p) => write!(f, "to {} .. end", p.name()),
            ExprKind::Op(op) => f.write_str(op.name()),
            ExprKind::List(list) => {
                f.write_str("[")?;
                items(f, list)?;
                f.write_str("]")
            }
            ExprKind::Group(list) => {
                f.write_str("(")?;
                items(f, list)?;
                f.write_str(")")
            }
            ExprKind::Quote(e) => match &e.e {
                ExprKind::Word(_) => write!(f, "\"{e}"),
                _ => write!(f, "{e}"),
            },
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Not enough inputs to {} (got {}, expected {})", .proc.name(), .args.len(), .proc.arity().min)]
    NotEnoughInputs { proc: ProcExpr, args: Vec<Expr> },
    #[error("Too many inputs to {} (got {}, expected at most {})", .proc.name(), .got, .proc.arity().max)]
    TooManyInputs { proc: ProcExpr, got: usize },
    #[error("Missing input to {}", .op.name())]
    MissingOpInput { op: Op },
    #[error("You don't say what to do with {val}")]
    UnusedVal { val: Expr },
    #[error("{ident} has no value")]
    UnknownVal { ident: Expr },
    #[error("I don't know how to {ident}")]
    UnknownProc { ident: Expr },
    #[error("{proc} didn't output to {to}")]
    NoOutputTo { proc: String, to: String },
    #[error("{proc} doesn't like {arg} as input")]
    BadArg { proc: String, arg: Expr },
    #[error("{} doesn't like {} as input", .op.name(), .arg)]
    BadOpArg { op: Op, arg: Expr },
    #[error("Can't divide by zero")]
    DivideByZero,
    #[error("{message}")]
    Host { proc: String, message: String },
    #[error("There's nowhere to read input from")]
    NoInput,
    #[error("I can't eval an empty list")]
    EmptyList,
    #[error("Too much recursion")]
    TooDeep,
}

impl Expr {
    pub fn eval<'a>(&'a self, env: &'a mut Env) -> LocalBoxFuture<'a, EvalResult> {
        async move {
            let e = match &self.e {
                ExprKind::Num(_) | ExprKind::Bool(_) => Some(self.e.clone()),
                ExprKind::Quote(v) => Some(ExprKind::clone(&v.e)),
                ExprKind::Word(w) => Some(ExprKind::Proc(env.lookup_proc(w).ok_or_else(
                    || EvalError::UnknownProc {
                        ident: self.clone(),
                    },
                )?)),
                ExprKind::Var(w) => Some(
                    env.lookup_var(w)
                        .ok_or_else(|| EvalError::UnknownVal {
                            ident: self.clone(),
                        })?
                        .e,
                ),
                ExprKind::List(list) => {
                    env.enter()?;
                    let ret = eval_list(list, env).await;
                    env.leave();
                    ret?.map(|ex| ex.e)
                }
                ExprKind::Group(list) => {
                    env.enter()?;
                    let ret = eval_group(list, env).await;
                    env.leave();
                    ret?.map(|ex| ex.e)
                }
                ExprKind::Proc(p) => {
                    return Err(EvalError::NotEnoughInputs {
                        proc: p.clone(),
                        args: vec![],
                    })
                }
                ExprKind::DefProc(p) => {
                    env.def_proc(p.clone());
                    None
                }
                ExprKind::Op(op) => return Err(EvalError::MissingOpInput { op: *op }),
            };
            let span = self.span;
            Ok(e.map(|e| Expr { e, span }))
        }
        .boxed_local()
    }
}

// Operator precedence, with the loosest-binding ones first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd)]
pub enum Priority {
    Stop,
    Cmp,
    Add,
    Mul,
}

/// Evaluate a list.
///
/// Logo is a bit weirder than lisp when it comes to evaluating a list. In lisp, the list `(f a b c)` is evaluated by
/// first evaluating `a`, `b`, and `c`, and then applying `f` with the results of those evaluations. In logo, however, `f`
/// is allowed to choose how many arguments it takes. For example, if `f` only wants a single argument then we first
/// evaluate `a`, then apply `f` to the result of that. Then we have `(b c)` left over and we repeat (by evaluating `c`
/// and applying `b` to the result of that).
///
/// If a function doesn't use up the whole list (like `f` in the example above) but it returns a value, that's an error.
pub fn eval_list<'a>(list: &'a [Expr], env: &'a mut Env) -> LocalBoxFuture<'a, EvalResult> {
    async move {
        let mut pos = 0;
        let mut last = None;
        while pos < list.len() {
            let (val, next) = eval_list_once(list, pos, Priority::Stop, env).await?;
            pos = next;
            match val {
                Some(v) if pos < list.len() => return Err(EvalError::UnusedVal { val: v }),
                v => last = v,
            }
        }
        Ok(last)
    }
    .boxed_local()
}

/// Evaluate a parenthesized list.
///
/// If the list starts with a procedure, everything else in the list goes to that procedure, which
/// lets procedures like `sum` take more than their usual number of inputs.
fn eval_group<'a>(list: &'a [Expr], env: &'a mut Env) -> LocalBoxFuture<'a, EvalResult> {
    async move {
        let Some(Expr {
            e: ExprKind::Word(name),
            span,
        }) = list.first()
        else {
            return eval_list(list, env).await;
        };
        let Some(proc) = env.lookup_proc(name) else {
            return eval_list(list, env).await;
        };

        let mut args = Vec::new();
        let mut pos = 1;
        while pos < list.len() {
            let (arg, next) = eval_list_once(list, pos, Priority::Stop, env).await?;
            args.push(arg.ok_or_else(|| EvalError::NoOutputTo {
                proc: list[pos].to_string(),
                to: proc.name().to_owned(),
            })?);
            pos = next;
        }
        let arity = proc.arity();
        if args.len() < arity.min {
            return Err(EvalError::NotEnoughInputs { proc, args });
        }
        if args.len() > arity.max {
            return Err(EvalError::TooManyInputs {
                got: args.len(),
                proc,
            });
        }
        let span = *span;
        Ok(proc
            .call(args, env)
            .await?
            .map(|v| Expr { e: v.e, span }))
    }
    .boxed_local()
}

/// Having already evaluated the left hand side of a binary operator, read the right hand side
/// from a list and evaluate the operator. Keeps going as long as the next operator binds more
/// tightly than `floor`.
///
/// Returns the result, and the position of the first part of the list that wasn't used.
fn eval_list_op<'a>(
    mut lhs: Expr,
    mut op: Op,
    list: &'a [Expr],
    mut pos: usize,
    floor: Priority,
    env: &'a mut Env,
) -> LocalBoxFuture<'a, Result<(Expr, usize), EvalError>> {
    async move {
        loop {
            let (rhs, next) = match eval_list_once(list, pos, op.priority(), env).await {
                Err(EvalError::EmptyList) => return Err(EvalError::MissingOpInput { op }),
                other => other?,
            };
            let rhs = rhs.ok_or(EvalError::MissingOpInput { op })?;
            lhs = op.eval(&lhs, &rhs)?;
            pos = next;

            match list.get(pos) {
                Some(Expr {
                    e: ExprKind::Op(next_op),
                    ..
                }) if next_op.priority() > floor => {
                    op = *next_op;
                    pos += 1;
                }
                _ => return Ok((lhs, pos)),
            }
        }
    }
    .boxed_local()
}

/// Evaluate the first part of a list (starting at `pos`).
///
/// With the documentation of [`eval_list`] for context, this function just evaluates the first part of a list,
/// by evaluating one function and the arguments it wants. It returns the result of that evaluation and also
/// the position of the part of the list that didn't get evaluated yet.
///
/// `priority` is for handling binary operators: if our evaluation would finish just before a binary operator,
/// and that operator has priority higher than `priority`, we evaluate that boolean operator.
/// For example, if the list is `(2 * 3 a b c)` and our priority is `+`, then we'll evaluate `2 * 3` and return
/// `(a b c)` as the remainder. But if our priority is `*` then we'll just evaluate `2` and return `(* 3 a b c)`
/// as the remainder.
pub fn eval_list_once<'a>(
    list: &'a [Expr],
    pos: usize,
    priority: Priority,
    env: &'a mut Env,
) -> LocalBoxFuture<'a, Result<(Option<Expr>, usize), EvalError>> {
    async move {
        let first = list.get(pos).ok_or(EvalError::EmptyList)?;
        let mut pos = pos + 1;
        let val = match first.eval(env).await? {
            None => return Ok((None, pos)),
            Some(Expr {
                e: ExprKind::Proc(p),
                span,
            }) => {
                let wanted = p.arity().min;
                let mut args = Vec::with_capacity(wanted);
                while args.len() < wanted {
                    if pos >= list.len() {
                        return Err(EvalError::NotEnoughInputs { proc: p, args });
                    }
                    let (arg, next) = eval_list_once(list, pos, priority, env).await?;
                    let arg = arg.ok_or_else(|| EvalError::NoOutputTo {
                        proc: list[pos].to_string(),
                        to: p.name().to_owned(),
                    })?;
                    pos = next;
                    args.push(arg);
                }
                match p.call(args, env).await? {
                    Some(v) => Expr { e: v.e, span },
                    None => return Ok((None, pos)),
                }
            }
            Some(x) => x,
        };

        match list.get(pos) {
            Some(Expr {
                e: ExprKind::Op(op),
                ..
            }) if op.priority() > priority => {
                let (val, next) = eval_list_op(val, *op, list, pos + 1, priority, env).await?;
                Ok((Some(val), next))
            }
            _ => Ok((Some(val), pos)),
        }
    }
    .boxed_local()
}
