use std::rc::Rc;

use crate::value::Value;

/// A value tagged with the source slice it was parsed from.
///
/// Equality is structural over `(value, start, stop)`, per `spec.md` §3. The
/// buffer reference is not compared, since two tokens produced from the same
/// logical input always share one `Rc<[char]>`.
#[derive(Clone)]
pub struct Token {
    pub value: Rc<Value>,
    pub buffer: Rc<[char]>,
    pub start: usize,
    pub stop: usize,
}

impl Token {
    pub fn new(value: Value, buffer: Rc<[char]>, start: usize, stop: usize) -> Self {
        debug_assert!(start <= stop && stop <= buffer.len());
        Token {
            value: Rc::new(value),
            buffer,
            start,
            stop,
        }
    }

    pub fn input(&self) -> String {
        self.buffer[self.start..self.stop].iter().collect()
    }

    /// Converts a position into a 1-based `(line, column)` pair.
    ///
    /// Counts `\n`, `\r\n`, and a bare `\r` as line terminators, matching the
    /// newline recognizer `\n | \r \n?` from `spec.md` §3.
    pub fn line_and_column_of(buffer: &[char], position: usize) -> (usize, usize) {
        let mut line = 1usize;
        let mut column = 1usize;
        let mut i = 0usize;
        let limit = position.min(buffer.len());
        while i < limit {
            match buffer[i] {
                '\n' => {
                    line += 1;
                    column = 1;
                    i += 1;
                }
                '\r' => {
                    line += 1;
                    column = 1;
                    i += 1;
                    if i < limit && buffer[i] == '\n' {
                        i += 1;
                    }
                }
                _ => {
                    column += 1;
                    i += 1;
                }
            }
        }
        (line, column)
    }

    pub fn line_and_column(&self) -> (usize, usize) {
        Self::line_and_column_of(&self.buffer, self.start)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.start == other.start && self.stop == other.stop
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &self.value)
            .field("start", &self.start)
            .field("stop", &self.stop)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_column_counts_crlf_as_one_terminator() {
        let buffer: Rc<[char]> = "a\r\nb\nc\rd".chars().collect::<Vec<_>>().into();
        assert_eq!(Token::line_and_column_of(&buffer, 0), (1, 1));
        // position of 'b', after "a\r\n"
        assert_eq!(Token::line_and_column_of(&buffer, 3), (2, 1));
        // position of 'c', after "a\r\nb\n"
        assert_eq!(Token::line_and_column_of(&buffer, 5), (3, 1));
        // position of 'd', after "a\r\nb\nc\r"
        assert_eq!(Token::line_and_column_of(&buffer, 7), (4, 1));
    }
}
