//! Input sanitization and field validation
//!
//! Everything here is a pure function. Nothing panics or returns an
//! error for bad input; callers get a value describing what was wrong and
//! decide whether to persist.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Length bounds, in characters, applied after sanitization
pub const COMPANY_NAME_MIN: usize = 2;
pub const COMPANY_NAME_MAX: usize = 100;
pub const CUSTOMER_NAME_MIN: usize = 2;
pub const CUSTOMER_NAME_MAX: usize = 50;

/// A field-level validation failure, shown next to the offending input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Result of checking a name field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameCheck {
    Valid { sanitized: String },
    Invalid { sanitized: String, reason: String },
}

impl NameCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, NameCheck::Valid { .. })
    }

    pub fn sanitized(&self) -> &str {
        match self {
            NameCheck::Valid { sanitized } | NameCheck::Invalid { sanitized, .. } => sanitized,
        }
    }

    /// Converts into the sanitized value or a field error for `field`
    pub fn into_result(self, field: &'static str) -> Result<String, ValidationError> {
        match self {
            NameCheck::Valid { sanitized } => Ok(sanitized),
            NameCheck::Invalid { reason, .. } => Err(ValidationError::new(field, reason)),
        }
    }
}

fn javascript_scheme() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)javascript:").expect("javascript scheme pattern"))
}

fn event_handler() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)on\w+\s*=").expect("event handler pattern"))
}

fn script_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("script block pattern"))
}

fn iframe_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<iframe\b.*?</iframe\s*>").expect("iframe block pattern"))
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"))
}

fn phone_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9\s()-]{10,}$").expect("phone pattern"))
}

/// Applies `step` until the text stops changing.
///
/// Removing one pattern can splice together another one
/// ("javajavascript:script:"), so a single pass is not enough.
fn strip_until_stable(input: &str, step: impl Fn(&str) -> String) -> String {
    let mut current = input.to_string();
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Strips angle brackets, `javascript:` schemes and inline event handlers
/// (`onclick=` and friends), then trims.
///
/// Idempotent, and the output never contains `<`, `>` or `javascript:`.
pub fn sanitize_input(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    strip_until_stable(input, |s| {
        let s = s.replace(['<', '>'], "");
        let s = javascript_scheme().replace_all(&s, "");
        event_handler().replace_all(&s, "").into_owned()
    })
    .trim()
    .to_string()
}

/// Sanitizes free text such as visit notes: drops `<script>` and `<iframe>`
/// blocks along with their content and any `javascript:` scheme, then trims.
/// Other markup is left alone.
pub fn sanitize_text_content(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    strip_until_stable(content, |s| {
        let s = script_block().replace_all(s, "");
        let s = iframe_block().replace_all(&s, "");
        javascript_scheme().replace_all(&s, "").into_owned()
    })
    .trim()
    .to_string()
}

fn attribute_handler() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(^|[\s"';])on\w+\s*="#).expect("attribute handler pattern"))
}

/// Checks a logo reference (URL or data URI). Markup, quotes, script
/// schemes and inline event handlers are refused.
pub fn is_safe_logo(logo: &str) -> bool {
    !logo.contains(['<', '>', '"', '\''])
        && !javascript_scheme().is_match(logo)
        && !attribute_handler().is_match(logo)
}

/// Format-only email check
pub fn validate_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// Format-only phone check. Phone numbers are optional, so empty passes.
pub fn validate_phone(phone: &str) -> bool {
    phone.is_empty() || phone_pattern().is_match(phone)
}

fn check_name(label: &str, name: &str, min: usize, max: usize) -> NameCheck {
    let sanitized = sanitize_input(name);
    let len = sanitized.chars().count();

    if len < min {
        NameCheck::Invalid {
            reason: format!("{} must be at least {} characters", label, min),
            sanitized,
        }
    } else if len > max {
        NameCheck::Invalid {
            reason: format!("{} must be at most {} characters", label, max),
            sanitized,
        }
    } else {
        NameCheck::Valid { sanitized }
    }
}

pub fn validate_company_name(name: &str) -> NameCheck {
    check_name("Company name", name, COMPANY_NAME_MIN, COMPANY_NAME_MAX)
}

pub fn validate_customer_name(name: &str) -> NameCheck {
    check_name("Customer name", name, CUSTOMER_NAME_MIN, CUSTOMER_NAME_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_safe_logo() {
        assert!(is_safe_logo(""));
        assert!(is_safe_logo("https://cdn.example.com/acme.png?size=64"));
        assert!(is_safe_logo("data:image/png;base64,iVBORw0KGgoAAAANSUhEUgont="));
        assert!(!is_safe_logo("<svg onload=alert(1)>"));
        assert!(!is_safe_logo("x.png onerror=alert(1)"));
        assert!(!is_safe_logo("x.png\" onerror=\"alert(1)"));
        assert!(!is_safe_logo("JavaScript:alert(1)"));
    }

    #[test]
    fn test_sanitize_input_strips_markup() {
        assert_eq!(sanitize_input("  <b>Acme</b>  "), "bAcme/b");
        assert_eq!(sanitize_input("JavaScript:alert(1)"), "alert(1)");
        assert_eq!(sanitize_input("x onclick = steal()"), "x  steal()");
        assert_eq!(sanitize_input(""), "");
    }

    #[test]
    fn test_sanitize_input_handles_spliced_patterns() {
        let out = sanitize_input("javajavascript:script:void(0)");
        assert!(!out.to_lowercase().contains("javascript:"));
        assert_eq!(out, "void(0)");
    }

    #[test]
    fn test_sanitize_input_is_idempotent() {
        let samples = [
            "Acme Corp",
            "  <script>alert('x')</script>  ",
            "jav<ascript:x",
            "oonnclick==1",
            "javascript: onload= <img>",
            "   ",
            "Ünïcödé <Name>",
        ];
        for s in samples {
            let once = sanitize_input(s);
            assert_eq!(sanitize_input(&once), once, "input: {:?}", s);
            assert!(!once.contains('<') && !once.contains('>'));
            assert!(!once.to_lowercase().contains("javascript:"));
        }
    }

    #[test]
    fn test_sanitize_text_content_removes_blocks() {
        let notes = "Met QA lead.<SCRIPT type=\"x\">\nalert(1)\n</script> Follow up <b>soon</b>";
        assert_eq!(
            sanitize_text_content(notes),
            "Met QA lead. Follow up <b>soon</b>"
        );

        let framed = "<iframe src=a></iframe>keep<iframe>\n</IFRAME>";
        assert_eq!(sanitize_text_content(framed), "keep");
        assert_eq!(sanitize_text_content(" javascript:go "), "go");
    }

    #[test]
    fn test_sanitize_text_content_is_non_greedy() {
        let text = "<script>a</script>middle<script>b</script>";
        assert_eq!(sanitize_text_content(text), "middle");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jane@example.com"));
        assert!(!validate_email("jane@example"));
        assert!(!validate_email("jane doe@example.com"));
        assert!(!validate_email(""));
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone(""));
        assert!(validate_phone("+1 (555) 123-4567"));
        assert!(validate_phone("0212 555 12 34"));
        assert!(!validate_phone("12345"));
        assert!(!validate_phone("555-CALL-NOW"));
    }

    #[test]
    fn test_validate_company_name() {
        let short = validate_company_name("A");
        assert!(!short.is_valid());

        let ok = validate_company_name("Acme Corp");
        assert_eq!(
            ok,
            NameCheck::Valid {
                sanitized: "Acme Corp".to_string()
            }
        );

        let long = "x".repeat(101);
        assert!(!validate_company_name(&long).is_valid());
        assert!(validate_company_name(&"x".repeat(100)).is_valid());
    }

    #[test]
    fn test_validate_company_name_counts_after_sanitizing() {
        // "<A>" sanitizes to "A", which is too short
        let check = validate_company_name("<A>");
        assert_eq!(check.sanitized(), "A");
        assert!(!check.is_valid());
    }

    #[test]
    fn test_validate_customer_name_bounds() {
        assert!(validate_customer_name("Jo").is_valid());
        assert!(!validate_customer_name(&"y".repeat(51)).is_valid());

        let err = validate_customer_name(" J ").into_result("name").unwrap_err();
        assert_eq!(err.field, "name");
        assert_eq!(err.message, "Customer name must be at least 2 characters");
    }
}
