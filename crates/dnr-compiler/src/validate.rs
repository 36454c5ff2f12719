/// Minimum plausible size of a downloaded filter list, in bytes.
const MIN_LIST_BYTES: usize = 100;
const SAMPLE_LINES: usize = 100;
const MIN_FILTER_LINES: usize = 5;

/// Sanity check for freshly downloaded list text, before it replaces a known-good copy.
///
/// Passes when the text is not trivially short and more than a handful of its
/// first lines look like filters.
pub fn looks_like_filter_list(text: &str) -> bool {
    if text.len() < MIN_LIST_BYTES {
        log::warn!("filter list too short ({} bytes)", text.len());
        return false;
    }

    let filter_lines = text
        .lines()
        .take(SAMPLE_LINES)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('!') && !line.starts_with('['))
        .filter(|line| line.contains('.') || line.contains("##") || line.contains("||"))
        .count();

    log::debug!("filter list sample has {filter_lines} filter-like lines");
    filter_lines > MIN_FILTER_LINES
}
