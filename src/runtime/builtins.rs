//! String built-ins (spec §4.6), executed directly by the evaluator rather
//! than defined in user code.

/// `strlen(s)`: length in code units (bytes, since identifiers/strings are
/// specified as ASCII-compatible text per spec §1's non-goals).
#[must_use]
pub fn strlen(s: &str) -> i64 {
    s.len() as i64
}

/// `substr(s, start, length)`: the contiguous slice, clamped to the
/// string's bounds rather than panicking on an out-of-range request.
#[must_use]
pub fn substr(s: &str, start: i64, length: i64) -> String {
    let len = s.len() as i64;
    if start < 0 || start >= len || length <= 0 {
        return String::new();
    }
    let start = start as usize;
    let end = ((start as i64) + length).min(len) as usize;
    s.get(start..end).unwrap_or_default().to_string()
}

/// `charat(s, i)`: single-character string, or empty if `i` is out of
/// range. Spec §8: "`charat(s, i)` returns empty string iff `i < 0` or
/// `i >= strlen(s)`."
#[must_use]
pub fn charat(s: &str, i: i64) -> String {
    if i < 0 || i >= s.len() as i64 {
        return String::new();
    }
    s.get(i as usize..i as usize + 1).unwrap_or_default().to_string()
}

/// `indexof(s, needle [, from_index])`: earliest position `>= from_index`,
/// or -1 if `needle` doesn't occur there. Spec §8: "`indexof(s, needle)`
/// returns -1 iff `needle` does not occur in `s` from the start position."
#[must_use]
pub fn indexof(s: &str, needle: &str, from_index: i64) -> i64 {
    let from = from_index.max(0) as usize;
    if from > s.len() {
        return -1;
    }
    match s.get(from..).and_then(|slice| slice.find(needle)) {
        Some(pos) => (from + pos) as i64,
        None => -1,
    }
}

/// `parseint(s)`: strict parse after trimming whitespace; falling back to
/// a permissive leading-digits scan, and finally `0` if nothing parseable
/// at all (spec §4.6).
#[must_use]
pub fn parseint(s: &str) -> i64 {
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return n;
    }
    let mut chars = trimmed.chars().peekable();
    let mut out = String::new();
    if chars.peek() == Some(&'-') {
        out.push(chars.next().unwrap());
    }
    for c in chars {
        if c.is_ascii_digit() {
            out.push(c);
        } else {
            break;
        }
    }
    out.parse::<i64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substr_identity_over_whole_string() {
        let s = "hello";
        assert_eq!(substr(s, 0, strlen(s)), s);
    }

    #[test]
    fn charat_bounds() {
        assert_eq!(charat("abc", -1), "");
        assert_eq!(charat("abc", 3), "");
        assert_eq!(charat("abc", 1), "b");
    }

    #[test]
    fn indexof_absent_is_minus_one() {
        assert_eq!(indexof("hello", "z", 0), -1);
        assert_eq!(indexof("hello", "llo", 0), 2);
        assert_eq!(indexof("hello", "l", 3), 3);
    }

    #[test]
    fn parseint_permissive_scan() {
        assert_eq!(parseint("  42"), 42);
        assert_eq!(parseint("-7abc"), -7);
        assert_eq!(parseint("abc"), 0);
        assert_eq!(parseint(&100.to_string()), 100);
    }
}
