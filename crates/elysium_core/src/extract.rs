//! Marker-delimited fragment extraction from model output.
//!
//! Model responses may carry executable regions bounded by two literal
//! markers. The extractor scans for those regions leftmost-first and yields
//! their absolute spans so the pipeline can splice execution reports back
//! into place.

/// One marked code region found in a response string.
///
/// `start`/`end` are byte offsets into the original string, spanning the
/// start marker through the end marker inclusive. `code` is the text strictly
/// between the markers, whitespace-trimmed; it may legitimately be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub start: usize,
    pub end: usize,
    pub code: String,
}

/// Scans text for regions delimited by a start and end marker.
///
/// Markers match byte-for-byte (case-sensitive). Matching is non-overlapping
/// and leftmost-first; fragment content may span multiple lines.
#[derive(Debug, Clone)]
pub struct FragmentExtractor {
    start_marker: String,
    end_marker: String,
}

impl FragmentExtractor {
    /// Panics if either marker is empty; markers come from config defaults
    /// and an empty marker would match everywhere.
    pub fn new(start_marker: impl Into<String>, end_marker: impl Into<String>) -> Self {
        let start_marker = start_marker.into();
        let end_marker = end_marker.into();
        assert!(
            !start_marker.is_empty() && !end_marker.is_empty(),
            "fragment markers must be non-empty"
        );
        Self {
            start_marker,
            end_marker,
        }
    }

    /// Lazy iterator over all fragments in `text`, in order of appearance.
    pub fn fragments<'a>(&'a self, text: &'a str) -> Fragments<'a> {
        Fragments {
            text,
            pos: 0,
            start_marker: &self.start_marker,
            end_marker: &self.end_marker,
        }
    }
}

/// Iterator returned by [`FragmentExtractor::fragments`].
pub struct Fragments<'a> {
    text: &'a str,
    pos: usize,
    start_marker: &'a str,
    end_marker: &'a str,
}

impl Iterator for Fragments<'_> {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        let haystack = self.text.get(self.pos..)?;
        let open = haystack.find(self.start_marker)?;
        let code_from = open + self.start_marker.len();
        let close = haystack[code_from..].find(self.end_marker)?;

        let start = self.pos + open;
        let code_start = self.pos + code_from;
        let code_end = code_start + close;
        let end = code_end + self.end_marker.len();
        self.pos = end;

        Some(Fragment {
            start,
            end,
            code: self.text[code_start..code_end].trim().to_string(),
        })
    }
}

/// Strip one optional markdown fence wrapping a fragment body.
///
/// Models sometimes wrap the marked region in a ```` ```lang ```` fence even
/// though the markers already delimit it. Removes exactly one leading fence
/// line and one trailing fence line when both are present; otherwise returns
/// the input unchanged.
pub fn strip_code_fence(code: &str) -> &str {
    let trimmed = code.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return code;
    };
    // The opening fence line may carry a language tag; drop through the newline.
    let Some(newline) = rest.find('\n') else {
        return code;
    };
    let body = &rest[newline + 1..];
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const START: &str = "%%PYTHON_EXECUTE_BLOCK_START%%";
    const END: &str = "%%PYTHON_EXECUTE_BLOCK_END%%";

    fn extractor() -> FragmentExtractor {
        FragmentExtractor::new(START, END)
    }

    #[test]
    fn no_markers_yields_nothing() {
        let found: Vec<_> = extractor().fragments("just a plain answer").collect();
        assert!(found.is_empty());
    }

    #[test]
    fn single_fragment_with_span() {
        let text = format!("before {START}\nprint(1+1)\n{END} after");
        let found: Vec<_> = extractor().fragments(&text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "print(1+1)");
        assert_eq!(found[0].start, "before ".len());
        assert_eq!(&text[found[0].end..], " after");
    }

    #[test]
    fn two_fragments_in_order() {
        let text = format!("a {START}one{END} b {START}two{END} c");
        let found: Vec<_> = extractor().fragments(&text).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].code, "one");
        assert_eq!(found[1].code, "two");
        assert!(found[0].end <= found[1].start);
    }

    #[test]
    fn whitespace_only_content_is_empty_fragment() {
        let text = format!("{START}\n   \n{END}");
        let found: Vec<_> = extractor().fragments(&text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "");
    }

    #[test]
    fn unterminated_marker_is_ignored() {
        let text = format!("answer {START} def f(): pass");
        assert_eq!(extractor().fragments(&text).count(), 0);
    }

    #[test]
    fn multiline_content_survives() {
        let text = format!("{START}\ndef f():\n    return 2\n\nprint(f())\n{END}");
        let found: Vec<_> = extractor().fragments(&text).collect();
        assert_eq!(found[0].code, "def f():\n    return 2\n\nprint(f())");
    }

    #[test]
    fn iterator_is_restartable() {
        let ex = extractor();
        let text = format!("{START}x{END}");
        assert_eq!(ex.fragments(&text).count(), 1);
        assert_eq!(ex.fragments(&text).count(), 1);
    }

    #[test]
    fn strips_tagged_fence() {
        assert_eq!(
            strip_code_fence("```python\nprint(1+1)\n```"),
            "print(1+1)"
        );
    }

    #[test]
    fn strips_untagged_fence() {
        assert_eq!(strip_code_fence("```\nx = 1\nprint(x)\n```"), "x = 1\nprint(x)");
    }

    #[test]
    fn leaves_unfenced_code_alone() {
        assert_eq!(strip_code_fence("print(1+1)"), "print(1+1)");
    }

    #[test]
    fn leaves_half_fence_alone() {
        assert_eq!(strip_code_fence("```python\nprint(1)"), "```python\nprint(1)");
    }
}
