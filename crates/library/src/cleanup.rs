//! Best-effort tidying of provider titles and artist credits.

const BRACKETS: [(char, char); 3] = [('[', ']'), ('{', '}'), ('(', ')')];

/// Splits a credit such as `"Foo & Bar"` or `"A, B and C"` into performers.
/// Commas only separate names when an `&`/`and` is present as well.
pub fn split_artists(raw: &str) -> Vec<String> {
    let mut text = raw.to_string();
    if text.contains(" and ") || text.contains(" & ") {
        text = text.replace(", ", ";");
    }
    text = text.replace(" & ", ";").replace(" and ", ";");
    text.split(';')
        .map(clean_artist)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Drops a leading `feat.`/`featuring` from a performer name.
pub fn clean_artist(name: &str) -> String {
    let mut name = name.trim();
    for prefix in ["featuring", "feat"] {
        if let Some(rest) = strip_word_prefix(name, prefix) {
            name = rest.trim_start_matches('.').trim();
        }
    }
    name.to_string()
}

/// Removes version suffixes and empty brackets from a title and moves
/// `(feat. X)` credits into `artists`.
pub fn clean_title(title: &str, artists: &mut Vec<String>) -> String {
    let original = title.trim();
    let mut name = original.to_string();
    loop {
        let before = name.clone();
        name = strip_version_suffix(&name);
        name = extract_featuring(&name, artists);
        name = strip_empty_brackets(&name);
        if name == before {
            break;
        }
    }
    if name.is_empty() {
        original.to_string()
    } else {
        name
    }
}

fn strip_word_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &name[prefix.len()..];
    match rest.chars().next() {
        Some(ch) if ch == '.' || ch.is_whitespace() => Some(rest),
        _ => None,
    }
}

fn strip_version_suffix(name: &str) -> String {
    for (open, close) in BRACKETS {
        let Some(body) = name.strip_suffix(close) else {
            continue;
        };
        let Some(start) = body.rfind(open) else {
            continue;
        };
        let inner = &body[start + open.len_utf8()..];
        if start > 0 && inner.trim().to_lowercase().ends_with("version") {
            return name[..start].trim_end().to_string();
        }
    }

    if name.to_lowercase().ends_with("version") {
        if let Some(start) = name.rfind(" - ") {
            if start > 0 {
                return name[..start].trim_end().to_string();
            }
        }
    }
    name.to_string()
}

fn extract_featuring(name: &str, artists: &mut Vec<String>) -> String {
    for (open, close) in BRACKETS {
        for (idx, _) in name.match_indices(open) {
            if idx == 0 {
                continue;
            }
            let inner_start = idx + open.len_utf8();
            let rest = &name[inner_start..];
            let is_feat = rest
                .get(..4)
                .map(|head| head.eq_ignore_ascii_case("feat"))
                .unwrap_or(false);
            if !is_feat {
                continue;
            }
            let Some(close_idx) = rest.find(close) else {
                continue;
            };

            let mut credit = &rest[4..close_idx];
            if credit
                .get(..5)
                .map(|head| head.eq_ignore_ascii_case("uring"))
                .unwrap_or(false)
            {
                credit = &credit[5..];
            }
            for artist in split_artists(credit.trim_start_matches('.')) {
                if !artists.iter().any(|known| known.eq_ignore_ascii_case(&artist)) {
                    artists.push(artist);
                }
            }

            let mut out = name[..idx].trim_end().to_string();
            out.push_str(&rest[close_idx + close.len_utf8()..]);
            return out.trim().to_string();
        }
    }
    name.to_string()
}

fn strip_empty_brackets(name: &str) -> String {
    let trimmed = name.trim_end();
    for (open, close) in BRACKETS {
        if let Some(body) = trimmed.strip_suffix(close) {
            if let Some(head) = body.trim_end().strip_suffix(open) {
                return head.trim_end().to_string();
            }
        }
    }
    trimmed.to_string()
}
