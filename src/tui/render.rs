/// Ratatui draw entry-point for unibot.
/// Thin dispatcher — conversation/sidebar rendering lives in chat.rs.
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::chat::spinner_frame;
use super::{AppState, LoginField, Screen, SignupField};

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    match state.screen {
        Screen::Login => draw_login(f, state),
        Screen::SignUp => draw_signup(f, state),
        Screen::Chat => draw_chat(f, state),
    }
}

// ── Form helpers ──────────────────────────────────────────────────────────────

fn centered_box(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

fn field_line(label: &str, value: &str, focused: bool, mask: bool) -> Line<'static> {
    let shown = if mask {
        "•".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let marker = if focused { "▸ " } else { "  " };
    let value_style = if focused {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    Line::from(vec![
        Span::styled(
            format!("{marker}{label:<10}"),
            Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }),
        ),
        Span::styled(shown, value_style),
        Span::styled(if focused { "▏" } else { "" }, Style::default().fg(Color::Cyan)),
    ])
}

// ── Login screen ──────────────────────────────────────────────────────────────

fn draw_login(f: &mut Frame, state: &AppState) {
    let area = f.area();
    let boxed = centered_box(area, 52, 12);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" UniBot ")
        .title_alignment(Alignment::Center);
    let inner = block.inner(boxed);
    f.render_widget(block, boxed);

    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        Line::raw(""),
        field_line(
            "Username",
            &state.login_username,
            state.login_focus == LoginField::Username,
            false,
        ),
        field_line(
            "Password",
            &state.login_password,
            state.login_focus == LoginField::Password,
            true,
        ),
        Line::raw(""),
    ];

    if state.login_pending {
        lines.push(
            Line::from(Span::styled(
                format!("{} logging in…", spinner_frame(state.spinner_tick)),
                Style::default().fg(Color::Cyan),
            ))
            .alignment(Alignment::Center),
        );
    } else if let Some(status) = state.session.status() {
        lines.push(
            Line::from(Span::styled(
                status.to_string(),
                Style::default().fg(Color::Yellow),
            ))
            .alignment(Alignment::Center),
        );
    } else {
        lines.push(Line::raw(""));
    }

    lines.push(
        Line::from(Span::styled(
            format!("{} · {}", state.profile, state.endpoint),
            Style::default().fg(Color::DarkGray),
        ))
        .alignment(Alignment::Center),
    );
    lines.push(Line::raw(""));
    lines.push(
        Line::from(Span::styled(
            "Enter: login · Tab: switch field · Ctrl+S: sign up · Ctrl+C: quit",
            Style::default().fg(Color::DarkGray),
        ))
        .alignment(Alignment::Center),
    );

    f.render_widget(Paragraph::new(lines), inner);
}

// ── Signup screen ─────────────────────────────────────────────────────────────

fn draw_signup(f: &mut Frame, state: &AppState) {
    let area = f.area();
    let boxed = centered_box(area, 56, 14);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Sign Up ")
        .title_alignment(Alignment::Center);
    let inner = block.inner(boxed);
    f.render_widget(block, boxed);

    let mut lines = vec![
        Line::raw(""),
        field_line(
            "Name",
            &state.signup_name,
            state.signup_focus == SignupField::Name,
            false,
        ),
        field_line(
            "Username",
            &state.signup_username,
            state.signup_focus == SignupField::Username,
            false,
        ),
        field_line(
            "Email",
            &state.signup_email,
            state.signup_focus == SignupField::Email,
            false,
        ),
        field_line(
            "Password",
            &state.signup_password,
            state.signup_focus == SignupField::Password,
            true,
        ),
        Line::raw(""),
    ];

    if state.signup_pending {
        lines.push(
            Line::from(Span::styled(
                format!("{} signing up…", spinner_frame(state.spinner_tick)),
                Style::default().fg(Color::Cyan),
            ))
            .alignment(Alignment::Center),
        );
    } else if let Some(status) = &state.signup_status {
        lines.push(
            Line::from(Span::styled(
                status.clone(),
                Style::default().fg(Color::Yellow),
            ))
            .alignment(Alignment::Center),
        );
    } else {
        lines.push(Line::raw(""));
    }

    lines.push(Line::raw(""));
    lines.push(
        Line::from(Span::styled(
            "Enter: submit · Tab: next field · Esc: back to login",
            Style::default().fg(Color::DarkGray),
        ))
        .alignment(Alignment::Center),
    );

    f.render_widget(Paragraph::new(lines), inner);
}

// ── Chat screen ───────────────────────────────────────────────────────────────

fn draw_chat(f: &mut Frame, state: &AppState) {
    let area = f.area();

    // Sidebar on the left when it fits
    let main_area = if area.width >= 70 {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(26), Constraint::Min(0)])
            .split(area);
        super::chat::draw_sidebar(f, state, cols[0]);
        cols[1]
    } else {
        area
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // conversation
            Constraint::Length(1), // status bar
            Constraint::Length(3), // input box
        ])
        .split(main_area);

    super::chat::draw_history(f, state, rows[0]);
    draw_status_bar(f, state, rows[1]);
    draw_input(f, state, rows[2]);
}

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let mut spans: Vec<Span> = Vec::new();

    let user = state.session.username().unwrap_or("?");
    spans.push(Span::styled(
        format!("  {user}"),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled(
        format!("  ·  {}", state.buffer.topic()),
        Style::default().fg(Color::Gray),
    ));

    if let Some(doc) = &state.document {
        spans.push(Span::styled(
            format!("  ·  ▤ {}", doc.name),
            Style::default().fg(Color::Green),
        ));
    }

    if state.pending_sends > 0 {
        spans.push(Span::styled(
            format!("  {} waiting…", spinner_frame(state.spinner_tick)),
            Style::default().fg(Color::Cyan),
        ));
    }

    // Upload notice outranks the general notice while it lives
    if let Some((msg, _)) = &state.upload_notice {
        spans.push(Span::styled(
            format!("  ·  {msg}"),
            Style::default().fg(Color::Green),
        ));
    } else if let Some(notice) = &state.notice {
        spans.push(Span::styled(
            format!("  ·  {notice}"),
            Style::default().fg(Color::Yellow),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let border = if state.sidebar_focused {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(" message · /help for commands ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    f.render_widget(
        Paragraph::new(state.input.as_str()).style(Style::default().fg(Color::White)),
        inner,
    );

    if !state.sidebar_focused {
        let before = &state.input[..state.cursor];
        let x = inner.x + before.width() as u16;
        if x < inner.x + inner.width {
            f.set_cursor_position((x, inner.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use ratatui::{backend::TestBackend, Terminal};

    fn render_to_string(state: &AppState) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw(f, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_login_screen_shows_profile_and_endpoint() {
        let resolved = ResolvedConfig {
            endpoint: "http://127.0.0.1:5000".to_string(),
            email_domain: "@umt.edu.pk".to_string(),
            profile_name: "local".to_string(),
        };
        let state = AppState::new(&resolved);
        let screen = render_to_string(&state);
        assert!(screen.contains("local · http://127.0.0.1:5000"));
    }
}
