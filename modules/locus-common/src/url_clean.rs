use url::Url;

/// Values spreadsheets and forms use for "no website".
const PLACEHOLDERS: &[&str] = &["", "nan", "none", "null", "n/a", "na"];

/// Normalize a user-supplied company URL.
///
/// Returns `None` for placeholders and anything without a usable host.
/// A missing scheme is treated as `https://`.
pub fn clean_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() || (!host.contains('.') && host != "localhost") {
        return None;
    }
    Some(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_rejected() {
        for raw in ["", "  ", "nan", "NaN", "None", "null", "N/A", "na"] {
            assert_eq!(clean_url(raw), None, "{raw:?} should be rejected");
        }
    }

    #[test]
    fn scheme_is_added() {
        assert_eq!(
            clean_url("acme.com").as_deref(),
            Some("https://acme.com/")
        );
        assert_eq!(
            clean_url(" http://acme.com/about ").as_deref(),
            Some("http://acme.com/about")
        );
    }

    #[test]
    fn hostless_input_is_rejected() {
        assert_eq!(clean_url("not a url"), None);
        assert_eq!(clean_url("https://"), None);
    }
}
