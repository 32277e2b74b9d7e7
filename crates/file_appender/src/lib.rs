use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppendError {
    #[error("at least 2 files are required, got {0}")]
    NotEnoughFiles(usize),
}

/// Merges delimited text files into one.
///
/// The first file keeps all of its lines; every later file drops its first
/// line unconditionally, on the assumption that it is a header. A later
/// file without a header therefore loses its first data line; that is the
/// documented behavior, not something this function tries to detect. Blank
/// lines are dropped everywhere. No schema or column-count validation
/// happens here; that is the caller's concern.
pub fn append_contents<S: AsRef<str>>(contents: &[S]) -> Result<String, AppendError> {
    if contents.len() < 2 {
        return Err(AppendError::NotEnoughFiles(contents.len()));
    }

    let mut out: Vec<&str> = Vec::new();
    for (index, content) in contents.iter().enumerate() {
        let lines = content
            .as_ref()
            .lines()
            .filter(|line| !line.trim().is_empty());
        let skip = if index == 0 { 0 } else { 1 };
        out.extend(lines.skip(skip));
    }

    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_drops_later_headers() {
        let file_a = "H1|H2\na1|a2\na3|a4\n";
        let file_b = "H1|H2\nb1|b2\nb3|b4\n";

        let merged = append_contents(&[file_a, file_b]).unwrap();
        let lines: Vec<&str> = merged.lines().collect();
        // 3 lines from the first file, 2 from the second (header dropped).
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "H1|H2");
        assert_eq!(lines[3], "b1|b2");
    }

    #[test]
    fn test_append_requires_two_files() {
        let err = append_contents(&["only one"]).unwrap_err();
        assert!(matches!(err, AppendError::NotEnoughFiles(1)));
        assert!(matches!(
            append_contents::<&str>(&[]).unwrap_err(),
            AppendError::NotEnoughFiles(0)
        ));
    }

    #[test]
    fn test_append_skips_blank_lines() {
        let file_a = "H\n\na\n   \nb\n";
        let file_b = "H\n\nc\n";
        let merged = append_contents(&[file_a, file_b]).unwrap();
        assert_eq!(merged, "H\na\nb\nc");
    }

    #[test]
    fn test_append_preserves_input_order() {
        let merged = append_contents(&["H\n1", "H\n2", "H\n3"]).unwrap();
        assert_eq!(merged, "H\n1\n2\n3");
    }

    #[test]
    fn test_headerless_later_file_loses_first_line() {
        // Documented behavior: the first line goes even if it is data.
        let merged = append_contents(&["H\na", "b\nc"]).unwrap();
        assert_eq!(merged, "H\na\nc");
    }
}
