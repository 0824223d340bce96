use jobflare::app::data_io::parse_url_list;
use jobflare::app::urls::normalize_url;
use pretty_assertions::assert_eq;

#[test]
fn scheme_is_added_when_missing() {
    assert_eq!(
        normalize_url("example.com/jobs/42"),
        Some("https://example.com/jobs/42".to_string())
    );
    assert_eq!(
        normalize_url("  http://example.com  "),
        Some("http://example.com".to_string())
    );
}

#[test]
fn rejects_comments_blanks_and_whitespace() {
    assert_eq!(normalize_url(""), None);
    assert_eq!(normalize_url("   \r"), None);
    assert_eq!(normalize_url("# https://example.com"), None);
    assert_eq!(normalize_url("bad line"), None);
    assert_eq!(normalize_url("https://example.com/a b"), None);
}

#[test]
fn rejects_foreign_schemes_and_missing_authority() {
    assert_eq!(normalize_url("ftp://example.com/file"), None);
    assert_eq!(normalize_url("mailto:jobs@example.com"), None);
    assert_eq!(normalize_url("https:///jobs/1"), None);
    assert_eq!(normalize_url("http:example.com"), None);
}

#[test]
fn canonical_urls_are_fixed_points() {
    let inputs = [
        "https://a.com/job/1",
        "example.com",
        "careers.example.org/jobs?id=7#apply",
        "http://localhost:8080/x",
    ];
    for input in inputs {
        let once = normalize_url(input).expect("input should normalize");
        assert_eq!(normalize_url(&once), Some(once.clone()), "input {input}");
    }
}

#[test]
fn list_skips_only_malformed_lines() {
    let list = parse_url_list("https://a.com/job/1\n\nexample.com\n  bad line\n#comment\n");
    assert_eq!(list.urls, vec!["https://a.com/job/1", "https://example.com"]);
    assert_eq!(list.skipped, 1);
    assert_eq!(list.total_lines, 5);
}
