/**
 * Helper functions for terminal input and output.
 */
use colored::*;

use rustyline::error::ReadlineError;

use super::common::{Result, VocabError};

#[macro_export]
macro_rules! my_println {
    ($($arg:tt)*) => ({
        use ::std::io::Write as _;
        writeln!(::std::io::stdout(), $($arg)*).map_err($crate::common::VocabError::Io)
    });
}

#[macro_export]
macro_rules! my_print {
    ($($arg:tt)*) => ({
        use ::std::io::Write as _;
        write!(::std::io::stdout(), $($arg)*).map_err($crate::common::VocabError::Io)
    });
}

/// Narrowest width text is ever wrapped to, however small the terminal.
const MIN_WRAP_WIDTH: usize = 20;

/// Display a prompt and read a line from standard input until the user enters a line
/// with at least one non-whitespace character, which is returned trimmed. Ctrl+D gives
/// `Ok(None)` and Ctrl+C gives `Err(VocabError::ReadlineInterrupted)`.
pub fn prompt(message: &str) -> Result<Option<String>> {
    let mut rl = rustyline::Editor::<()>::new();
    loop {
        match rl.readline(message) {
            Ok(response) => {
                let response = response.trim();
                if !response.is_empty() {
                    return Ok(Some(response.to_string()));
                }
            }
            Err(ReadlineError::Interrupted) => {
                return Err(VocabError::ReadlineInterrupted);
            }
            Err(ReadlineError::Eof) => {
                return Ok(None);
            }
            _ => {}
        }
    }
}

/// Ask a yes-or-no question. Anything but an answer starting with "y" is a no.
pub fn confirm(message: &str) -> Result<bool> {
    let response = prompt(message)?;
    Ok(response.map(|r| r.to_lowercase().starts_with('y')).unwrap_or(false))
}

/// Print `message` to standard output, breaking lines according to the current width
/// of the terminal. Prepend `prefix` to the first line and indent all subsequent lines
/// by its length.
pub fn prettyprint(message: &str, prefix: &str) -> Result<()> {
    prettyprint_colored(message, prefix, None, None)
}

pub fn prettyprint_colored(
    message: &str,
    prefix: &str,
    message_color: Option<Color>,
    prefix_color: Option<Color>,
) -> Result<()> {
    let prefix_width = prefix.chars().count();
    let width = textwrap::termwidth().saturating_sub(prefix_width).max(MIN_WRAP_WIDTH);
    let mut lines = textwrap::wrap_iter(message, width);

    if let Some(first_line) = lines.next() {
        let colored_prefix = color_optional(prefix, prefix_color);
        let colored_line = color_optional(&first_line, message_color);
        my_println!("{}{}", colored_prefix, colored_line)?;
    }

    let indent = " ".repeat(prefix_width);
    for line in lines {
        let colored_line = color_optional(&line, message_color);
        my_println!("{}{}", indent, colored_line)?;
    }
    Ok(())
}

fn color_optional(text: &str, color: Option<Color>) -> ColoredString {
    if let Some(color) = color {
        text.color(color)
    } else {
        text.normal()
    }
}
