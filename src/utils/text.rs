// Text utils

use icu::segmenter::WordSegmenter;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::data_model::LinkItem;

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Collapse runs of whitespace (including newlines from HTML extraction)
/// into single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Segment `text` into words. Segments that carry no alphanumeric content
/// (pure punctuation, whitespace) are dropped.
pub fn split_into_words(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let segmenter = WordSegmenter::new_auto();
    let mut words = Vec::new();
    let mut prev_break = 0;

    // segment_str() yields break points as byte offsets; a segment is the
    // text between two consecutive breaks.
    for current_break in segmenter.segment_str(text) {
        if current_break > prev_break {
            let segment = text[prev_break..current_break].trim();
            if !segment.is_empty() && segment.chars().any(|c| c.is_alphanumeric()) {
                words.push(segment);
            }
        }
        prev_break = current_break;
    }
    words
}

/// Concatenate every textual signal a link carries into one searchable
/// string: link surface attributes first, then local context, then the
/// page metadata. Duplicate fragments are dropped, first occurrence wins.
pub fn aggregate_text(item: &LinkItem) -> String {
    let mut fragments: Vec<&str> = Vec::new();
    fragments.extend(item.text.as_deref());
    fragments.extend(item.title.as_deref());
    fragments.extend(item.aria_label.as_deref());
    fragments.extend(item.rel.as_deref());
    fragments.extend(item.context.previous_text.as_deref());
    fragments.extend(item.context.next_text.as_deref());
    fragments.extend(item.context.heading_hierarchy.iter().map(String::as_str));
    fragments.extend(item.metadata.title.as_deref());
    fragments.extend(item.metadata.description.as_deref());

    let joined = fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unique()
        .join(" ");
    normalize_whitespace(&joined)
}

/// Extract a window of `window` words on either side of every occurrence of
/// `keyword` in `text`. Matching is case-insensitive and word-aligned, so a
/// multi-word keyword matches as a phrase. Returns one window string per
/// occurrence; empty when the keyword never occurs.
pub fn keyword_windows(text: &str, keyword: &str, window: usize) -> Vec<String> {
    let words = split_into_words(text);
    let keyword_words: Vec<String> = split_into_words(keyword)
        .iter()
        .map(|w| w.to_lowercase())
        .collect();
    if words.is_empty() || keyword_words.is_empty() || keyword_words.len() > words.len() {
        return Vec::new();
    }

    let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let mut windows = Vec::new();
    for start in 0..=(lowered.len() - keyword_words.len()) {
        if lowered[start..start + keyword_words.len()] == keyword_words[..] {
            let lo = start.saturating_sub(window);
            let hi = (start + keyword_words.len() + window).min(words.len());
            windows.push(words[lo..hi].join(" "));
        }
    }
    windows
}
