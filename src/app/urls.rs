use url::{ParseError, Url};

/// Turns one line of a job list into a canonical absolute `http(s)` URL.
///
/// Blank lines, `#` comments, lines with interior whitespace, foreign schemes
/// and URLs without an authority are rejected. A missing scheme is replaced by
/// `https://`; apart from that the line is returned as written.
pub fn normalize_url(raw: &str) -> Option<String> {
    let line = raw.trim().replace('\r', "");
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if line.chars().any(char::is_whitespace) {
        return None;
    }

    let candidate = match Url::parse(&line) {
        Ok(_) => line,
        Err(ParseError::RelativeUrlWithoutBase) => format!("https://{line}"),
        Err(_) => return None,
    };

    let parsed = Url::parse(&candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    if !has_authority(&candidate) {
        return None;
    }

    Some(candidate)
}

// The url crate repairs `http:host` and `https:///host`, so the authority is
// checked on the raw text.
fn has_authority(candidate: &str) -> bool {
    let Some((_, rest)) = candidate.split_once(':') else {
        return false;
    };
    let Some(rest) = rest.strip_prefix("//") else {
        return false;
    };
    let authority = rest
        .split(|ch| matches!(ch, '/' | '?' | '#'))
        .next()
        .unwrap_or("");
    !authority.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_is_read_from_raw_text() {
        assert!(has_authority("https://a.com/x"));
        assert!(has_authority("http://user@host:8080?q"));
        assert!(!has_authority("http:host"));
        assert!(!has_authority("https:///jobs/1"));
        assert!(!has_authority("https://?q=1"));
    }
}
