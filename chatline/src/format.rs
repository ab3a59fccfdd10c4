//! Reflow of long chat lines into fixed-width display lines.
//!
//! Text is cut every `width` characters. A cut that splits a word gets a
//! hyphen before the line break; a cut at whitespace gets a padded plain
//! break instead. The last chunk is emitted as-is.

/// Default display width, in characters, above which incoming text is reflowed.
pub const DEFAULT_DISPLAY_WIDTH: usize = 65;

/// Appended to a chunk whose cut falls inside a word.
const CONTINUATION: &str = "-\n";

/// Appended to a chunk whose cut falls at or next to whitespace.
const NATURAL_BREAK: &str = "    \n";

/// Splits `text` into lines of at most `width` characters.
///
/// For every chunk except the last, the cut point is inspected: if neither
/// the character just before it nor the one just after it is whitespace,
/// [`CONTINUATION`] is appended, otherwise [`NATURAL_BREAK`]. Width and
/// length are measured in `char`s. A zero `width` or empty `text` returns the
/// input unchanged.
#[must_use]
pub fn reflow(text: &str, width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if width == 0 || chars.len() <= width {
        return text.to_string();
    }

    let breaks = chars.len() / width + 1;
    let mut out = String::with_capacity(text.len() + breaks * NATURAL_BREAK.len());
    let mut start = 0;
    while start < chars.len() {
        let end = (start + width).min(chars.len());
        out.extend(&chars[start..end]);
        if end == chars.len() {
            break;
        }
        let splits_word = !chars[end - 1].is_whitespace() && !chars[end].is_whitespace();
        out.push_str(if splits_word { CONTINUATION } else { NATURAL_BREAK });
        start = end;
    }
    out
}

/// Reflows `text` only when it is longer than `width` characters.
#[must_use]
pub fn fit_to_width(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        reflow(text, width)
    } else {
        text.to_string()
    }
}
