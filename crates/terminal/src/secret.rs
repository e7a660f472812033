//! Reading a line from the console without echoing it.

use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// What one console event did to the line being typed.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Typing,
    Done,
    Cancelled,
}

/// Read one line in raw mode so nothing is echoed.
///
/// Blocks the calling thread. `None` when the user presses Esc, Ctrl-C or
/// Ctrl-D. Raw mode is switched off again before returning.
pub(crate) fn read_hidden_line() -> io::Result<Option<String>> {
    enable_raw_mode()?;
    let result = collect_line();
    disable_raw_mode()?;
    result
}

fn collect_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    loop {
        match feed(&mut line, event::read()?) {
            Step::Typing => {}
            Step::Done => return Ok(Some(line)),
            Step::Cancelled => return Ok(None),
        }
    }
}

fn feed(line: &mut String, event: Event) -> Step {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => feed_key(line, key),
        Event::Paste(text) => {
            line.push_str(&text);
            Step::Typing
        }
        _ => Step::Typing,
    }
}

fn feed_key(line: &mut String, key: KeyEvent) -> Step {
    match key.code {
        KeyCode::Enter => Step::Done,
        KeyCode::Esc => Step::Cancelled,
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => Step::Cancelled,
        KeyCode::Char(c) => {
            line.push(c);
            Step::Typing
        }
        KeyCode::Backspace => {
            line.pop();
            Step::Typing
        }
        _ => Step::Typing,
    }
}
