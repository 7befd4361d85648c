use std::borrow::Cow;

/// Ellipsis string used for truncation
const ELLIPSIS: &str = "...";

/// Truncates a title to fit within a maximum character count.
///
/// If truncation is necessary, appends "..." to indicate text was cut off.
/// Counts `char`s, not bytes, so multi-byte titles are never split inside a
/// code point.
///
/// # Examples
///
/// ```
/// use marquee::util::truncate_title;
///
/// assert_eq!(truncate_title("Solaris", 10), "Solaris");
/// assert_eq!(truncate_title("The Shawshank Redemption", 10), "The Sha...");
/// ```
pub fn truncate_title(s: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }
    let total = s.chars().count();
    if total <= max_chars {
        return Cow::Borrowed(s);
    }
    if max_chars <= ELLIPSIS.len() {
        return Cow::Owned(s.chars().take(max_chars).collect());
    }

    let keep = max_chars - ELLIPSIS.len();
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    Cow::Owned(out)
}

/// Formats a vote average as a one-decimal score out of ten.
///
/// ```
/// use marquee::util::format_rating;
///
/// assert_eq!(format_rating(7.123), "7.1/10");
/// assert_eq!(format_rating(0.0), "–");
/// ```
pub fn format_rating(vote_average: f64) -> String {
    if vote_average <= 0.0 {
        "–".to_string()
    } else {
        format!("{:.1}/10", vote_average)
    }
}

/// Formats an ISO release date (`YYYY-MM-DD`) as a short human date.
///
/// Unparseable or absent dates render as "unreleased" rather than erroring —
/// catalog data is frequently missing release information.
///
/// ```
/// use marquee::util::format_release_date;
///
/// assert_eq!(format_release_date(Some("2024-06-01")), "Jun 2024");
/// assert_eq!(format_release_date(None), "unreleased");
/// ```
pub fn format_release_date(release_date: Option<&str>) -> String {
    release_date
        .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| "unreleased".to_string())
}
