/// Lowercase, dash-separated token safe for filenames and URLs.
///
/// Non-ASCII text is transliterated first, so `LÖVE` becomes `love`.
pub fn slugify(value: &str) -> String {
    let ascii = deunicode::deunicode(value);
    let mut output = String::with_capacity(ascii.len());
    let mut previous_dash = false;
    for ch in ascii.chars() {
        if ch.is_ascii_alphanumeric() {
            output.push(ch.to_ascii_lowercase());
            previous_dash = false;
            continue;
        }
        if !previous_dash && !output.is_empty() {
            output.push('-');
            previous_dash = true;
        }
    }
    while output.ends_with('-') {
        output.pop();
    }
    output
}

/// Slugifies everything before the last `.` and keeps the extension verbatim.
pub fn slugify_filename(value: &str) -> String {
    match value.rsplit_once('.') {
        Some((stem, extension)) => format!("{}.{extension}", slugify(stem)),
        None => slugify(value),
    }
}
