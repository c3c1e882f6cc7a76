use std::fmt;

/// The first diagnostic produced by a failed compilation.
///
/// Errors are reported once: the tokenizer's sticky error flag suppresses
/// every message after the first, and all parser productions unwind as soon
/// as the flag is set. The consumer therefore only ever sees one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(file: &str, line: u32, message: String) -> Self {
        ParseError {
            file: file.to_string(),
            line,
            message,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) : {}", self.file, self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_cites_file_and_line() {
        let error = ParseError::new("shader.hlsl", 12, "Undeclared identifier 'foo'".to_string());
        assert_eq!(
            error.to_string(),
            "shader.hlsl(12) : Undeclared identifier 'foo'"
        );
    }
}
