/// Turn formatter — annotates raw assistant text for the rendering layer.
///
/// Pure and total: any input string produces a defined output string, never
/// an error. The output carries lightweight structural markup (`<h1>`–`<h3>`,
/// `<strong>`) that `tui::chat` turns into styled spans. No sanitization
/// happens here; the renderer owns escaping of untrusted content.

/// Annotate one raw assistant response.
///
/// Applied per line, in order:
/// 1. heading markers `### ` / `## ` / `# ` (longest first, so a `###` line
///    is annotated exactly once);
/// 2. `**…**` pairs become strong-emphasis spans;
/// 3. an enumerated list item ("1. like this") is emphasised whole.
pub fn format(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    for (i, line) in raw.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format_line(line));
    }
    // str::lines swallows a trailing newline — preserve it
    if raw.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn format_line(line: &str) -> String {
    // Check ### before ## before # so the shorter rule never fires on the
    // residue of a longer marker.
    for (marker, level) in [("### ", 3), ("## ", 2), ("# ", 1)] {
        if let Some(rest) = line.strip_prefix(marker) {
            return format!("<h{level}>{}</h{level}>", emphasise(rest));
        }
    }

    let emphasised = emphasise(line);
    if is_enumerated_item(line) {
        return format!("<strong>{emphasised}</strong>");
    }
    emphasised
}

/// Replace `**text**` pairs with `<strong>text</strong>`.
/// An unmatched trailing marker is left verbatim.
fn emphasise(line: &str) -> String {
    const MARKER: &str = "**";

    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find(MARKER) {
        let after_open = &rest[open + MARKER.len()..];
        match after_open.find(MARKER) {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push_str("<strong>");
                out.push_str(&after_open[..close]);
                out.push_str("</strong>");
                rest = &after_open[close + MARKER.len()..];
            }
            None => break, // lone marker — emit the remainder untouched
        }
    }
    out.push_str(rest);
    out
}

/// "Leading integer, period, space, rest of line."
fn is_enumerated_item(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    let rest = &line[digits..];
    let Some(rest) = rest.strip_prefix(". ") else {
        return false;
    };
    !rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_levels() {
        assert_eq!(format("# Title"), "<h1>Title</h1>");
        assert_eq!(format("## Section"), "<h2>Section</h2>");
        assert_eq!(format("### Sub"), "<h3>Sub</h3>");
    }

    #[test]
    fn test_h3_not_double_annotated() {
        // The # rule must not fire on the residue of the ### rule
        assert_eq!(format("### Hi"), "<h3>Hi</h3>");
        assert!(!format("### Hi").contains("<h1>"));
    }

    #[test]
    fn test_emphasis_pair() {
        assert_eq!(format("say **hello** now"), "say <strong>hello</strong> now");
    }

    #[test]
    fn test_unmatched_marker_passes_through() {
        assert_eq!(format("broken **pair"), "broken **pair");
        assert_eq!(format("**a** and **b"), "<strong>a</strong> and **b");
    }

    #[test]
    fn test_enumerated_item_wrapped_whole() {
        assert_eq!(
            format("1. First step"),
            "<strong>1. First step</strong>"
        );
        assert_eq!(
            format("12. Later step"),
            "<strong>12. Later step</strong>"
        );
    }

    #[test]
    fn test_not_enumerated() {
        assert_eq!(format("1.no space"), "1.no space");
        assert_eq!(format("1. "), "1. ");
        assert_eq!(format(". leading dot"), ". leading dot");
    }

    #[test]
    fn test_total_over_any_input() {
        assert_eq!(format(""), "");
        assert_eq!(format("plain text"), "plain text");
        assert_eq!(format("**"), "**");
        assert_eq!(format("\n\n"), "\n\n");
    }

    #[test]
    fn test_multiline_mixed() {
        let out = format("### Hi\nok");
        assert_eq!(out, "<h3>Hi</h3>\nok");
    }

    #[test]
    fn test_emphasis_inside_heading() {
        assert_eq!(format("## a **b** c"), "<h2>a <strong>b</strong> c</h2>");
    }
}
