//! Duration-string grammar shared by user `time_limit` and sailor `max_time`:
//! `DD-hh:mm:ss` or `hh:mm:ss`. Anything that doesn't parse is "disabled" (0),
//! never rejected.

/// Parses a duration string into seconds. Short field lists (fewer than 3
/// `:`-separated fields) are padded on the left with zeros, so `"mm:ss"` and
/// `"ss"` both parse. Out-of-range fields (e.g. minutes >= 60) are not
/// bounds-checked, matching the original's plain arithmetic. Returns 0 for
/// empty or non-numeric input ("unparseable means disabled").
pub fn parse_duration_secs(raw: &str) -> u64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }

    let (days_part, rest) = match raw.split_once('-') {
        Some((d, r)) => (Some(d), r),
        None => (None, raw),
    };

    let days: u64 = match days_part {
        Some(d) => match d.parse() {
            Ok(v) => v,
            Err(_) => return 0,
        },
        None => 0,
    };

    let mut fields: Vec<&str> = rest.split(':').collect();
    if fields.len() > 3 {
        return 0;
    }
    while fields.len() < 3 {
        fields.insert(0, "0");
    }

    let mut parsed = [0u64; 3];
    for (i, f) in fields.iter().enumerate() {
        match f.parse::<u64>() {
            Ok(v) => parsed[i] = v,
            Err(_) => return 0,
        }
    }
    let [hours, minutes, seconds] = parsed;

    days * 86_400 + hours * 3_600 + minutes * 60 + seconds
}
