use std::{cell::RefCell, path::Path, rc::Rc};

use futures::executor::block_on;
use turtlebox_host::{
    bindings,
    turtlebox::{Command, Defaults, Recorder, Screen},
    ScriptRuntime,
};
use turtlelogo::LogoRuntime;

#[derive(Default, Clone)]
pub struct TestCase {
    input: String,
    expected: String,
}

/// Runs a program against a fresh screen, returning everything it drew.
fn draw(source: &str) -> Result<Vec<Command>, String> {
    let recorder = Recorder::default();
    let screen = Rc::new(RefCell::new(Screen::with_sink(
        Defaults::default(),
        Box::new(recorder.clone()),
    )));
    let mut logo = LogoRuntime::new();
    bindings::install(&mut logo, &screen);
    block_on(logo.run(dbg!(source)))?;
    Ok(recorder.take())
}

impl TestCase {
    fn exec(&self) {
        let a = draw(&self.input).unwrap();
        let b = draw(&self.expected).unwrap();
        assert!(a.len() > 1, "{} didn't draw anything", self.input);
        assert_eq!(a, b);
    }

    fn exec_failure(&self) {
        let err = draw(&self.input).unwrap_err();
        assert_eq!(err, self.expected.trim());
    }
}

pub fn read_tests(path: impl AsRef<Path>) -> Vec<TestCase> {
    let text = std::fs::read_to_string(path).unwrap();
    let mut ret = Vec::new();
    let mut in_input = true;
    let mut cur = TestCase::default();

    fn separator_line(line: &str, ch: u8) -> bool {
        line.trim().len() >= 2 && line.trim().bytes().all(|c| c == ch)
    }

    for line in text.split_inclusive('\n') {
        if in_input {
            if separator_line(line, b'-') {
                in_input = false;
            } else {
                cur.input += line;
            }
        } else if separator_line(line, b'=') {
            in_input = true;
            ret.push(std::mem::take(&mut cur));
        } else {
            cur.expected += line;
        }
    }
    ret
}

#[test]
fn equivalent_programs() {
    let tests = read_tests("tests/equivalent.txt");
    assert!(!tests.is_empty());
    for test in tests {
        test.exec();
    }
}

#[test]
fn failures() {
    let tests = read_tests("tests/failures.txt");
    assert!(!tests.is_empty());
    for test in tests {
        test.exec_failure();
    }
}
