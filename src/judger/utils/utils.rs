/// Resolve `url` against `base`; absolute urls pass through.
pub fn join_url(base: &str, url: &str) -> String {
    if url.starts_with("http") {
        return url.into();
    }

    let mut res = base.to_string();

    if !res.ends_with('/') {
        res.push('/')
    }

    res.push_str(url.strip_prefix('/').unwrap_or(url));
    res
}

/// `https://host/` -> `https://host`
pub fn origin_of(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// At most `max` bytes of `text` for log lines, cut on a char boundary.
pub fn excerpt(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Whether some occurrence of `first` is followed by `second` within
/// `window` bytes.
pub fn appears_near(text: &str, first: &str, second: &str, window: usize) -> bool {
    text.match_indices(first).any(|(pos, _)| {
        let mut end = std::cmp::min(pos + window, text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[pos..end].contains(second)
    })
}
