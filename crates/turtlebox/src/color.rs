use std::fmt;

use crate::TurtleError;

/// A loosely-typed argument, as handed over by a script.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Num(f64),
    Text(String),
    Seq(Vec<Arg>),
}

impl Arg {
    /// Numbers are numbers, and so is text that spells one.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Arg::Num(x) => Some(*x),
            Arg::Text(s) => s.trim().parse().ok(),
            Arg::Seq(_) => None,
        }
    }

    /// Like [`Arg::as_num`], but only for whole numbers (the way `int("5")` works and
    /// `int("5.5")` doesn't).
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Num(x) if x.is_finite() => Some(x.trunc() as i64),
            Arg::Num(_) => None,
            Arg::Text(s) => s.trim().parse().ok(),
            Arg::Seq(_) => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Num(x) => write!(f, "{x}"),
            Arg::Text(s) => f.write_str(s),
            Arg::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

fn channel(x: f64) -> i64 {
    // `NaN as i64` is 0, which is as good an answer as any.
    x.clamp(0.0, 255.0).trunc() as i64
}

/// Turns color arguments into a CSS color string.
///
/// In order: a single piece of text is used verbatim; a single three-element sequence is
/// unpacked; three numbers are clamped into `0..=255`, truncated, and written as `rgb(r,g,b)`.
/// Anything else is an invalid argument.
pub fn normalize_color(args: &[Arg]) -> Result<String, TurtleError> {
    if let [Arg::Text(s)] = args {
        return Ok(s.clone());
    }
    let args: &[Arg] = match args {
        [Arg::Seq(items)] => items,
        other => other,
    };
    let [r, g, b] = args else {
        return Err(TurtleError::invalid("color", "bad color argument"));
    };
    let component = |arg: &Arg| {
        arg.as_num()
            .map(channel)
            .ok_or_else(|| TurtleError::invalid("color", format!("bad color component {arg}")))
    };
    Ok(format!(
        "rgb({},{},{})",
        component(r)?,
        component(g)?,
        component(b)?
    ))
}
