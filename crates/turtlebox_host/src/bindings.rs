//! The turtle operations, as host functions a script can call.

use std::{cell::RefCell, rc::Rc};

use futures::{future, FutureExt};
use turtlebox::{normalize_color, Arg, Screen, TurtleError, TurtleRef};

use crate::{Arity, Callable, HostFn, ScriptRuntime, Value};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TurtleOp {
    Forward,
    Backward,
    Left,
    Right,
    Goto,
    SetHeading,
    Home,
    PenUp,
    PenDown,
    Color,
    PenSize,
    Speed,
    HideTurtle,
    ShowTurtle,
    Clear,
    BgColor,
    Reset,
    Tracer,
    Update,
    Position,
    XCor,
    YCor,
    Heading,
    IsDown,
    IsVisible,
    NewTurtle,
    SetTurtle,
}

use TurtleOp::*;

const fn one() -> Arity {
    Arity::exactly(1)
}

const fn none() -> Arity {
    Arity::exactly(0)
}

/// Every name a script can use for a turtle operation.
pub const BINDINGS: &[(&str, TurtleOp, Arity)] = &[
    ("forward", Forward, one()),
    ("fd", Forward, one()),
    ("backward", Backward, one()),
    ("back", Backward, one()),
    ("bk", Backward, one()),
    ("left", Left, one()),
    ("lt", Left, one()),
    ("right", Right, one()),
    ("rt", Right, one()),
    ("goto", Goto, Arity::between(1, 2)),
    ("setpos", Goto, Arity::between(1, 2)),
    ("setposition", Goto, Arity::between(1, 2)),
    ("setxy", Goto, Arity::exactly(2)),
    ("setheading", SetHeading, one()),
    ("seth", SetHeading, one()),
    ("home", Home, none()),
    ("penup", PenUp, none()),
    ("pu", PenUp, none()),
    ("pendown", PenDown, none()),
    ("pd", PenDown, none()),
    ("color", Color, Arity::between(0, 3)),
    ("pencolor", Color, Arity::between(0, 1)),
    ("setpencolor", Color, one()),
    ("setcolor", Color, one()),
    ("pensize", PenSize, Arity::between(0, 1)),
    ("width", PenSize, Arity::between(0, 1)),
    ("setpensize", PenSize, one()),
    ("setwidth", PenSize, one()),
    ("speed", Speed, Arity::between(0, 1)),
    ("setspeed", Speed, one()),
    ("hideturtle", HideTurtle, none()),
    ("ht", HideTurtle, none()),
    ("showturtle", ShowTurtle, none()),
    ("st", ShowTurtle, none()),
    ("clear", Clear, none()),
    ("clean", Clear, none()),
    ("clearscreen", Clear, none()),
    ("cs", Clear, none()),
    ("bgcolor", BgColor, Arity::between(1, 3)),
    ("setbackground", BgColor, Arity::between(1, 3)),
    ("reset", Reset, none()),
    ("tracer", Tracer, Arity::between(1, 2)),
    ("update", Update, none()),
    ("position", Position, none()),
    ("pos", Position, none()),
    ("xcor", XCor, none()),
    ("ycor", YCor, none()),
    ("heading", Heading, none()),
    ("isdown", IsDown, none()),
    ("pendownp", IsDown, none()),
    ("isvisible", IsVisible, none()),
    ("shownp", IsVisible, none()),
    ("newturtle", NewTurtle, one()),
    ("setturtle", SetTurtle, one()),
];

/// Registers every turtle operation with `runtime`, all acting on `screen`.
pub fn install<R: ScriptRuntime + ?Sized>(runtime: &mut R, screen: &Rc<RefCell<Screen>>) {
    for &(name, op, arity) in BINDINGS {
        let screen = Rc::clone(screen);
        let f: HostFn = Rc::new(move |args: Vec<Value>| {
            let result = apply(op, name, &mut screen.borrow_mut(), &args)
                .map_err(|e| e.to_string());
            future::ready(result).boxed_local()
        });
        runtime.register(Callable {
            name: name.to_owned(),
            arity,
            f,
        });
    }
}

fn bad(name: &'static str, detail: impl Into<String>) -> TurtleError {
    TurtleError::InvalidArgument {
        op: name,
        detail: detail.into(),
    }
}

fn to_arg(v: &Value) -> Arg {
    match v {
        Value::Num(x) => Arg::Num(*x),
        Value::Bool(b) => Arg::Num(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => Arg::Text(s.clone()),
        Value::List(items) => Arg::Seq(items.iter().map(to_arg).collect()),
    }
}

fn to_args(vs: &[Value]) -> Vec<Arg> {
    vs.iter().map(to_arg).collect()
}

fn num(name: &'static str, v: &Value) -> Result<f64, TurtleError> {
    v.as_num()
        .filter(|x| x.is_finite())
        .ok_or_else(|| bad(name, format!("{v} is not a number")))
}

fn nth(name: &'static str, args: &[Value], i: usize) -> Result<f64, TurtleError> {
    match args.get(i) {
        Some(v) => num(name, v),
        None => Err(bad(name, "not enough inputs")),
    }
}

fn point(name: &'static str, args: &[Value]) -> Result<(f64, f64), TurtleError> {
    match args {
        [Value::List(xy)] if xy.len() == 2 => Ok((num(name, &xy[0])?, num(name, &xy[1])?)),
        [x, y] => Ok((num(name, x)?, num(name, y)?)),
        _ => Err(bad(name, "expected an x and a y")),
    }
}

/// Runs one operation, as called by the name `name`.
pub fn apply(
    op: TurtleOp,
    name: &'static str,
    screen: &mut Screen,
    args: &[Value],
) -> Result<Option<Value>, TurtleError> {
    log::trace!("{name} {args:?}");
    match op {
        Reset => screen.reset(),
        Tracer => {
            // Like `int(n)`, falling back to drawing immediately.
            let n = args.first().and_then(|v| to_arg(v).as_int()).unwrap_or(1);
            let delay = args.get(1).and_then(Value::as_num);
            screen.tracer(n, delay);
        }
        Update => {
            screen.update();
        }
        NewTurtle => screen.spawn(&turtle_name(name, args)?),
        SetTurtle => screen.select(&turtle_name(name, args)?)?,
        _ => return apply_to_turtle(op, name, screen.current(), args),
    }
    Ok(None)
}

fn apply_to_turtle(
    op: TurtleOp,
    name: &'static str,
    mut t: TurtleRef<'_>,
    args: &[Value],
) -> Result<Option<Value>, TurtleError> {
    let arg = |i| nth(name, args, i);
    let ret = match op {
        Forward => {
            t.forward(arg(0)?);
            None
        }
        Backward => {
            t.backward(arg(0)?);
            None
        }
        Left => {
            t.left(arg(0)?);
            None
        }
        Right => {
            t.right(arg(0)?);
            None
        }
        Goto => {
            let (x, y) = point(name, args)?;
            t.goto(x, y);
            None
        }
        SetHeading => {
            t.setheading(arg(0)?);
            None
        }
        Home => {
            t.home();
            None
        }
        PenUp => {
            t.penup();
            None
        }
        PenDown => {
            t.pendown();
            None
        }
        Color => t
            .color(&to_args(args))
            .map_err(|e| rename(e, name))?
            .map(Value::Text),
        PenSize => {
            let size = args.first().map(|v| num(name, v)).transpose()?;
            t.pensize(size)
                .map_err(|e| rename(e, name))?
                .map(Value::Num)
        }
        Speed => t
            .speed(args.first().map(to_arg).as_ref())
            .map(|s| Value::Num(s.into())),
        HideTurtle => {
            t.hideturtle();
            None
        }
        ShowTurtle => {
            t.showturtle();
            None
        }
        Clear => {
            t.clear();
            None
        }
        BgColor => {
            let color = normalize_color(&to_args(args)).map_err(|e| rename(e, name))?;
            t.bgcolor(color);
            None
        }
        Position => {
            let p = t.position();
            Some(Value::List(vec![Value::Num(p.x), Value::Num(p.y)]))
        }
        XCor => Some(Value::Num(t.xcor())),
        YCor => Some(Value::Num(t.ycor())),
        Heading => Some(Value::Num(t.heading())),
        IsDown => Some(Value::Bool(t.isdown())),
        IsVisible => Some(Value::Bool(t.isvisible())),
        Reset | Tracer | Update | NewTurtle | SetTurtle => {
            return Err(bad(name, "not something a single turtle can do"));
        }
    };
    Ok(ret)
}

fn turtle_name(name: &'static str, args: &[Value]) -> Result<String, TurtleError> {
    match args.first() {
        Some(v @ (Value::Text(_) | Value::Num(_))) => Ok(v.to_text()),
        Some(v) => Err(bad(name, format!("{v} can't name a turtle"))),
        None => Err(bad(name, "which turtle?")),
    }
}

// Report errors under the name the script actually used.
fn rename(e: TurtleError, name: &'static str) -> TurtleError {
    match e {
        TurtleError::InvalidArgument { detail, .. } => bad(name, detail),
        other => other,
    }
}
