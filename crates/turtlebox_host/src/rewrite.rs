use std::borrow::Cow;

use regex::{Captures, Regex};

/// Prefixes calls of a blocking input builtin with an await marker, so that a runtime without a
/// native input hook still suspends at the right places.
///
/// This is a textual heuristic, not a parse. A call is rewritten only when the builtin's name is
/// not immediately preceded by a word character or a `.`, so `obj.input(` and `raw_input(` are
/// left alone. Calls made through another name (`ask = input; ask()`) are never rewritten, and a
/// call nested directly inside another (`input(input())`) only has the outer one rewritten.
/// Matches inside string literals are rewritten too.
#[derive(Clone, Debug)]
pub struct InputRewrite {
    pattern: Regex,
    builtin: String,
    marker: String,
}

impl InputRewrite {
    /// `marker` is inserted verbatim in front of the builtin's name; include any trailing space
    /// it needs.
    pub fn new(builtin: &str, marker: &str) -> Result<InputRewrite, regex::Error> {
        let pattern = Regex::new(&format!(r"(^|[^\w.]){}\s*\(", regex::escape(builtin)))?;
        Ok(InputRewrite {
            pattern,
            builtin: builtin.to_owned(),
            marker: marker.to_owned(),
        })
    }

    pub fn apply<'s>(&self, source: &'s str) -> Cow<'s, str> {
        self.pattern.replace_all(source, |caps: &Captures| {
            format!("{}{}{}(", &caps[1], self.marker, self.builtin)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(src: &str) -> String {
        InputRewrite::new("input", "await ")
            .unwrap()
            .apply(src)
            .into_owned()
    }

    #[test]
    fn rewrites_bare_calls() {
        assert_eq!(rewrite("x = input()"), "x = await input()");
        assert_eq!(rewrite("input('a')"), "await input('a')");
        assert_eq!(rewrite("n = int(input ('n? '))"), "n = int(await input('n? '))");
        assert_eq!(
            rewrite("a = input()\nb = input()"),
            "a = await input()\nb = await input()"
        );
    }

    #[test]
    fn leaves_qualified_calls() {
        assert_eq!(rewrite("sys.input()"), "sys.input()");
        assert_eq!(rewrite("raw_input()"), "raw_input()");
        assert_eq!(rewrite("myinput()"), "myinput()");
        assert_eq!(rewrite("inputs = 3"), "inputs = 3");
    }

    #[test]
    fn misses_aliases() {
        assert_eq!(rewrite("ask = input\nask()"), "ask = input\nask()");
        assert_eq!(rewrite("input(input())"), "await input(input())");
    }
}
