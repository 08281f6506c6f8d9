//! Indentation-aware text accumulator for generated source

use crate::error::EmitError;
use std::fmt;

/// Spaces written per indent level
pub const INDENT_WIDTH: usize = 4;

/// Append-only buffer that tracks block depth for one emission session.
///
/// Blocks are brace-delimited. Depth is a plain counter; callers keep
/// `begin_block`/`end_block` balanced and the buffer only refuses to go
/// below zero.
///
/// ```
/// use codegen_writeback::codegen::EmitBuffer;
///
/// # fn main() -> Result<(), codegen_writeback::EmitError> {
/// let mut buf = EmitBuffer::new();
/// buf.write_line("impl Foo");
/// buf.begin_block();
/// buf.write_line("const ID: u32 = 7;");
/// buf.end_block()?;
/// assert_eq!(buf.render(), "impl Foo\n{\n    const ID: u32 = 7;\n}\n");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitBuffer {
    text: String,
    indent_level: usize,
}

impl EmitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            indent_level: 0,
        }
    }

    /// Current block depth
    pub fn depth(&self) -> usize {
        self.indent_level
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Write the current indent, an opening brace and a newline, then nest.
    pub fn begin_block(&mut self) -> &mut Self {
        self.write_indent();
        self.text.push_str("{\n");
        self.indent_level += 1;
        self
    }

    /// Un-nest, then write the shallower indent, a closing brace and a newline.
    ///
    /// Fails with [`EmitError::IndentUnderflow`] when no block is open. The
    /// buffer is left untouched in that case.
    pub fn end_block(&mut self) -> Result<&mut Self, EmitError> {
        self.indent_level = self
            .indent_level
            .checked_sub(1)
            .ok_or(EmitError::IndentUnderflow)?;
        self.write_indent();
        self.text.push_str("}\n");
        Ok(self)
    }

    /// Append a bare newline.
    pub fn blank_line(&mut self) -> &mut Self {
        self.text.push('\n');
        self
    }

    /// Write one indented line.
    ///
    /// Whitespace-only input produces a bare newline so blank lines never
    /// carry leading whitespace.
    pub fn write_line(&mut self, line: &str) -> &mut Self {
        if !is_blank(line) {
            self.write_indent();
            self.text.push_str(line);
        }
        self.text.push('\n');
        self
    }

    /// Re-indent a multi-line literal.
    ///
    /// The input is split on `\r\n`, `\n` and `\r`, and every piece goes
    /// through [`write_line`](Self::write_line) at the current depth. Leading
    /// whitespace in the literal is dropped: indentation comes only from the
    /// buffer. A trailing line break yields a final blank line.
    pub fn write_verbatim(&mut self, text: &str) -> &mut Self {
        for line in split_line_breaks(text) {
            self.write_line(line.trim_start());
        }
        self
    }

    /// Append `text` as-is: no indent, no newline.
    pub fn write(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// Append `depth * 4` spaces.
    pub fn write_indent(&mut self) -> &mut Self {
        let width = self.indent_level * INDENT_WIDTH;
        self.text.extend(std::iter::repeat_n(' ', width));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Snapshot of the accumulated text. Does not clear the buffer.
    pub fn render(&self) -> String {
        self.text.clone()
    }

    /// Finish the session and take the text.
    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Write for EmitBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.text.push_str(s);
        Ok(())
    }
}

impl fmt::Display for EmitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<EmitBuffer> for String {
    fn from(buffer: EmitBuffer) -> Self {
        buffer.into_string()
    }
}

fn is_blank(line: &str) -> bool {
    line.chars().all(char::is_whitespace)
}

/// Split on `\r\n`, `\n` or `\r`, keeping empty pieces.
fn split_line_breaks(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    lines.push(&text[start..]);
    lines
}
