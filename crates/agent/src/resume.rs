//! Resume text resolution.
//!
//! When the request carries a PDF path, its extracted text supersedes the
//! inline text; extraction failures degrade gracefully. The result is capped
//! before it reaches the prompt layer.

use std::path::Path;
use tracing::{info, warn};

/// Cap on the resume text carried through a run.
const MAX_RESUME_CHARS: usize = 8000;

fn cap(text: String) -> String {
    if text.len() <= MAX_RESUME_CHARS {
        return text;
    }
    let mut end = MAX_RESUME_CHARS;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Resolve the resume text for a run from the inline text and optional PDF.
pub fn resolve_resume_text(resume_text: &str, resume_path: Option<&str>) -> String {
    if let Some(path_str) = resume_path {
        let path = Path::new(path_str);
        if path.exists() {
            match pdf_extract::extract_text(path) {
                Ok(text) if !text.trim().is_empty() => {
                    info!(path = %path.display(), chars = text.len(), "Resume PDF extracted");
                    return cap(text);
                }
                Ok(_) => {
                    warn!(path = %path.display(), "Resume PDF contained no text, using inline text");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Resume PDF extraction failed, using inline text");
                }
            }
        } else {
            warn!(path = %path_str, "Resume file not found, using inline text");
        }
    }
    cap(resume_text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_inline_text_passthrough() {
        let text = resolve_resume_text("Jane Doe, Rust developer", None);
        assert_eq!(text, "Jane Doe, Rust developer");
    }

    #[test]
    fn test_missing_file_falls_back_to_inline() {
        let text = resolve_resume_text("inline resume", Some("/nonexistent/resume.pdf"));
        assert_eq!(text, "inline resume");
    }

    #[test]
    fn test_invalid_pdf_falls_back_to_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"this is not a pdf").unwrap();

        let text = resolve_resume_text("inline resume", Some(path.to_str().unwrap()));
        assert_eq!(text, "inline resume");
    }

    #[test]
    fn test_cap_applies_to_long_text() {
        let long = "r".repeat(20_000);
        let text = resolve_resume_text(&long, None);
        assert_eq!(text.len(), 8000);
    }
}
