//! Output sink behind `console.log` and `console.error`.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Where console output goes.
#[derive(Debug, Clone, Default)]
pub enum Console {
    /// Process stdout / stderr
    #[default]
    Stdio,
    /// In-memory buffers, read back through [`Capture`]
    Captured(Capture),
}

/// Handle to captured console output.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    buffers: Rc<RefCell<Buffers>>,
}

#[derive(Debug, Default)]
struct Buffers {
    stdout: Vec<String>,
    stderr: Vec<String>,
}

impl Console {
    /// A console writing into memory, plus the handle to read it.
    pub fn capture() -> (Console, Capture) {
        let capture = Capture::default();
        (Console::Captured(capture.clone()), capture)
    }

    pub fn log(&self, line: &str) {
        match self {
            // A closed stdout is not a script error.
            Console::Stdio => {
                let _ = writeln!(std::io::stdout().lock(), "{}", line);
            }
            Console::Captured(capture) => capture.buffers.borrow_mut().stdout.push(line.to_string()),
        }
    }

    pub fn error(&self, line: &str) {
        match self {
            Console::Stdio => {
                let _ = writeln!(std::io::stderr().lock(), "{}", line);
            }
            Console::Captured(capture) => capture.buffers.borrow_mut().stderr.push(line.to_string()),
        }
    }
}

impl Capture {
    /// Lines written with `console.log`.
    pub fn stdout(&self) -> Vec<String> {
        self.buffers.borrow().stdout.clone()
    }

    /// Lines written with `console.error`.
    pub fn stderr(&self) -> Vec<String> {
        self.buffers.borrow().stderr.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_separates_streams() {
        let (console, capture) = Console::capture();
        console.log("one");
        console.error("oops");
        console.log("two");
        assert_eq!(capture.stdout(), vec!["one", "two"]);
        assert_eq!(capture.stderr(), vec!["oops"]);
    }
}
