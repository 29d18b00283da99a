/// Conversation pane and sidebar rendering — build_items, annotated-text
/// parsing, word wrapping.
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

use super::AppState;
use crate::conversation::{Role, Turn};

// ── Spinner ────────────────────────────────────────────────────────────────────

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn spinner_frame(tick: u32) -> &'static str {
    SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()]
}

// ── Annotated-text parsing ─────────────────────────────────────────────────────
// The turn formatter emits <h1>/<h2>/<h3> per line and inline <strong> spans.
// This is the rendering layer the formatter stays ignorant of; escaping
// decisions live here (we render text verbatim as terminal cells, so there is
// nothing to escape).

fn heading_style(level: u8) -> Style {
    match level {
        1 => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        2 => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        _ => Style::default()
            .fg(Color::LightCyan)
            .add_modifier(Modifier::BOLD),
    }
}

/// Split one annotated line into styled spans.
pub fn parse_annotated(line: &str, base: Style) -> Vec<Span<'static>> {
    for level in [3u8, 2, 1] {
        let open = format!("<h{level}>");
        let close = format!("</h{level}>");
        if let Some(inner) = line
            .strip_prefix(open.as_str())
            .and_then(|r| r.strip_suffix(close.as_str()))
        {
            return inline_spans(inner, heading_style(level));
        }
    }
    inline_spans(line, base)
}

/// Expand `<strong>…</strong>` segments; everything else keeps `base`.
fn inline_spans(text: &str, base: Style) -> Vec<Span<'static>> {
    const OPEN: &str = "<strong>";
    const CLOSE: &str = "</strong>";

    let mut spans = Vec::new();
    let mut rest = text;
    loop {
        match rest.find(OPEN) {
            Some(start) => {
                let after = &rest[start + OPEN.len()..];
                match after.find(CLOSE) {
                    Some(end) => {
                        if start > 0 {
                            spans.push(Span::styled(rest[..start].to_string(), base));
                        }
                        spans.push(Span::styled(
                            after[..end].to_string(),
                            base.add_modifier(Modifier::BOLD),
                        ));
                        rest = &after[end + CLOSE.len()..];
                    }
                    None => break,
                }
            }
            None => break,
        }
    }
    if !rest.is_empty() || spans.is_empty() {
        spans.push(Span::styled(rest.to_string(), base));
    }
    spans
}

// ── Word wrap ──────────────────────────────────────────────────────────────────

pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = word.len(); // close enough for ASCII
        if current_width == 0 {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + 1 + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(current.clone());
            current = word.to_string();
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

// ── Conversation items ─────────────────────────────────────────────────────────

fn push_turn(items: &mut Vec<ListItem<'static>>, turn: &Turn, width: usize) {
    match turn.role {
        Role::User => {
            let label_style = Style::default()
                .fg(Color::Rgb(160, 140, 255))
                .add_modifier(Modifier::BOLD);
            let body = Style::default().fg(Color::Rgb(235, 232, 255));
            let mut first = true;
            for raw in turn.text.lines().chain(turn.text.is_empty().then_some("")) {
                for line in wrap_text(raw, width.saturating_sub(8).max(10)) {
                    let prefix = if first { "  you  " } else { "       " };
                    first = false;
                    items.push(ListItem::new(Line::from(vec![
                        Span::styled(prefix.to_string(), label_style),
                        Span::styled(line, body),
                    ])));
                }
            }
        }
        Role::Assistant => {
            let base = Style::default().fg(Color::White);
            for raw in turn.text.lines() {
                // Headings render as a single styled line; plain lines get
                // inline emphasis and wrapping
                if raw.starts_with("<h") {
                    let mut spans = vec![Span::raw("  ")];
                    spans.extend(parse_annotated(raw, base));
                    items.push(ListItem::new(Line::from(spans)));
                } else {
                    for line in wrap_text(raw, width.saturating_sub(4).max(10)) {
                        let mut spans = vec![Span::raw("  ")];
                        spans.extend(parse_annotated(&line, base));
                        items.push(ListItem::new(Line::from(spans)));
                    }
                }
            }
        }
    }
    items.push(ListItem::new(Line::raw("")));
}

pub fn build_items(state: &AppState, width: u16) -> Vec<ListItem<'static>> {
    let mut items = Vec::new();
    for turn in state.buffer.turns() {
        push_turn(&mut items, turn, width as usize);
    }
    items
}

// ── Conversation pane ──────────────────────────────────────────────────────────

pub fn draw_history(f: &mut Frame, state: &AppState, area: Rect) {
    let items = build_items(state, area.width);
    let total = items.len();
    let visible = area.height as usize;

    // scroll counts lines up from the bottom; clamp so we never scroll past
    // the oldest turn
    let max_scroll = total.saturating_sub(visible);
    let scroll = state.scroll.min(max_scroll);
    let start = total.saturating_sub(visible + scroll);
    let end = total.saturating_sub(scroll);
    let window: Vec<ListItem> = items[start..end].to_vec();

    f.render_widget(List::new(window), area);
}

// ── Sidebar ────────────────────────────────────────────────────────────────────

pub fn draw_sidebar(f: &mut Frame, state: &AppState, area: Rect) {
    let border_style = if state.sidebar_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::RIGHT)
        .border_style(border_style)
        .title(" Chat History ");

    let inner_width = area.width.saturating_sub(3) as usize;
    let items: Vec<ListItem> = state
        .registry
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let selected = state.sidebar_focused && i == state.sidebar_selected;
            let style = if selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let mut label = format!("{} ({})", entry.topic, entry.turns.len());
            if label.len() > inner_width {
                label.truncate(inner_width.saturating_sub(1));
                label.push('…');
            }
            ListItem::new(Line::from(Span::styled(format!(" {label}"), style)))
        })
        .collect();

    let list = if items.is_empty() {
        List::new(vec![ListItem::new(Line::from(Span::styled(
            " (no archived chats)",
            Style::default().fg(Color::DarkGray),
        )))])
    } else {
        List::new(items)
    };
    f.render_widget(list.block(block), area);
}
