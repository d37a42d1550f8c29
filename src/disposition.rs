//! Filename extraction from `content-disposition` response headers.
//!
//! Servers format this header loosely: `filename="CV.docx"`,
//! `filename=CV.docx`, and `FILENAME = "CV.docx"` are all seen in the wild.
//! The rules here:
//!
//! 1. Find a `filename=` parameter at a parameter boundary (start or `;`),
//!    case-insensitively.
//! 2. A quoted value runs to the closing quote; an unquoted value runs to the
//!    next `;`. Surrounding whitespace and one pair of quotes are stripped.
//! 3. `filename*=` (RFC 5987) is not decoded. It never matches rule 1, so a
//!    header carrying only `filename*=` falls back to the default; a header
//!    carrying both uses the plain `filename=`.
//! 4. Backslash escapes inside quotes are not decoded; such a value falls
//!    back to the default.
//! 5. Absent, empty, or unmatched → [`DEFAULT_FILENAME`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Name used when the server does not provide a usable one.
pub const DEFAULT_FILENAME: &str = "formatted_resume.docx";

static FILENAME_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*(?:"([^"]*)"|([^;]*))"#)
        .expect("filename regex is valid")
});

/// Filename carried by a `content-disposition` header, or the default.
pub fn filename_from_header(header: Option<&str>) -> String {
    header
        .and_then(parse_filename)
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn parse_filename(header: &str) -> Option<String> {
    let caps = FILENAME_PARAM.captures(header)?;
    let value = match (caps.get(1), caps.get(2)) {
        (Some(quoted), _) => {
            if quoted.as_str().contains('\\') {
                return None;
            }
            quoted.as_str().trim()
        }
        (None, Some(bare)) => bare.as_str().trim().trim_matches('"').trim(),
        (None, None) => return None,
    };
    (!value.is_empty()).then(|| value.to_string())
}

/// Reduce a server-provided name to a single safe path component.
///
/// Only the final component survives, so `../../etc/passwd` becomes
/// `passwd`; names that reduce to nothing, `.` or `..` become the default.
pub fn safe_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(char::is_control);
    match last {
        "" | "." | ".." => DEFAULT_FILENAME.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_filename() {
        assert_eq!(
            filename_from_header(Some(r#"attachment; filename="report.docx""#)),
            "report.docx"
        );
    }

    #[test]
    fn unquoted_filename() {
        assert_eq!(
            filename_from_header(Some("attachment; filename=Adam_Weiss_Formatted_Resume.docx")),
            "Adam_Weiss_Formatted_Resume.docx"
        );
    }

    #[test]
    fn quoted_filename_with_spaces_and_semicolons() {
        assert_eq!(
            filename_from_header(Some(r#"attachment; filename="My CV; final.docx"; size=12"#)),
            "My CV; final.docx"
        );
    }

    #[test]
    fn unquoted_stops_at_next_parameter() {
        assert_eq!(
            filename_from_header(Some("attachment; filename=cv.docx; size=1024")),
            "cv.docx"
        );
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        assert_eq!(
            filename_from_header(Some(r#"Attachment;FileName = "cv.docx""#)),
            "cv.docx"
        );
    }

    #[test]
    fn missing_header_uses_default() {
        assert_eq!(filename_from_header(None), DEFAULT_FILENAME);
        assert_eq!(filename_from_header(Some("")), DEFAULT_FILENAME);
        assert_eq!(filename_from_header(Some("attachment")), DEFAULT_FILENAME);
        assert_eq!(filename_from_header(Some(r#"attachment; filename="""#)), DEFAULT_FILENAME);
    }

    #[test]
    fn extended_syntax_alone_uses_default() {
        assert_eq!(
            filename_from_header(Some("attachment; filename*=UTF-8''R%C3%A9sum%C3%A9.docx")),
            DEFAULT_FILENAME
        );
    }

    #[test]
    fn extended_syntax_with_plain_fallback_uses_plain() {
        assert_eq!(
            filename_from_header(Some(
                "attachment; filename*=UTF-8''R%C3%A9sum%C3%A9.docx; filename=Resume.docx"
            )),
            "Resume.docx"
        );
    }

    #[test]
    fn escaped_quotes_use_default() {
        assert_eq!(
            filename_from_header(Some(r#"attachment; filename="a\"b.docx""#)),
            DEFAULT_FILENAME
        );
    }

    #[test]
    fn not_fooled_by_similar_parameter_names() {
        assert_eq!(
            filename_from_header(Some(r#"attachment; myfilename="x.docx""#)),
            DEFAULT_FILENAME
        );
    }

    #[test]
    fn safe_file_name_strips_directories() {
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name(r"C:\Users\me\cv.docx"), "cv.docx");
        assert_eq!(safe_file_name("cv.docx"), "cv.docx");
        assert_eq!(safe_file_name(".."), DEFAULT_FILENAME);
        assert_eq!(safe_file_name("dir/"), DEFAULT_FILENAME);
    }
}
