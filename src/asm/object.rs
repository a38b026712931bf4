//! Object file format for Duck Machine programs.
//!
//! Object files are plain text:
//! - One memory word per line, in decimal
//! - Negative values are the two's complement word
//! - Text after `#` or `;` is a comment
//! - Blank lines are ignored

use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Parse object file text into memory words.
pub fn parse_object(text: &str) -> Result<Vec<u32>, ObjectError> {
    let mut words = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let code = match line.find(['#', ';']) {
            Some(idx) => &line[..idx],
            None => line,
        }
        .trim();

        if code.is_empty() {
            continue;
        }

        let value: i64 = code.parse().map_err(|_| ObjectError::Parse {
            line: index + 1,
            message: format!("expected a decimal word, found `{}`", code),
        })?;
        if !(i32::MIN as i64..=u32::MAX as i64).contains(&value) {
            return Err(ObjectError::Parse {
                line: index + 1,
                message: format!("{} does not fit in 32 bits", value),
            });
        }
        words.push(value as u32);
    }

    Ok(words)
}

/// Render memory words as object file text.
pub fn format_object(words: &[u32]) -> String {
    let mut text = format!("# Duck Machine object file\n# {} words\n", words.len());
    for &word in words {
        text.push_str(&(word as i32).to_string());
        text.push('\n');
    }
    text
}

/// Load an object file from disk.
pub fn load_object<P: AsRef<Path>>(path: P) -> Result<Vec<u32>, ObjectError> {
    let text =
        std::fs::read_to_string(path.as_ref()).map_err(|e| ObjectError::Io(e.to_string()))?;
    parse_object(&text)
}

/// Save memory words to an object file.
pub fn save_object<P: AsRef<Path>>(path: P, words: &[u32]) -> Result<(), ObjectError> {
    let mut file =
        std::fs::File::create(path.as_ref()).map_err(|e| ObjectError::Io(e.to_string()))?;
    file.write_all(format_object(words).as_bytes())
        .map_err(|e| ObjectError::Io(e.to_string()))
}

/// Errors that can occur reading or writing object files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let text = "# header\n\n12\n-1   ; all ones\n4294967295\n";
        assert_eq!(parse_object(text), Ok(vec![12, u32::MAX, u32::MAX]));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_object("1\nbogus\n"),
            Err(ObjectError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_object("4294967296"),
            Err(ObjectError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_format_then_parse() {
        let words = vec![0x03C0_0000, 7, (-9i32) as u32];
        assert_eq!(parse_object(&format_object(&words)), Ok(words));
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("duck-object-{}.obj", std::process::id()));
        save_object(&path, &[1, 2, 3]).unwrap();
        let words = load_object(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(words, vec![1, 2, 3]);
    }
}
