//! Status bar
//!
//! Displays connection status, the current user, unread badges and the last
//! status message.

use agora_app::{App, ConnectionState};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

/// Render the status bar.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let connection_status = match app.connection_state() {
        ConnectionState::Disconnected => Span::styled("Disconnected", Style::default().fg(Color::Red)),
        ConnectionState::Connecting => Span::styled("Connecting...", Style::default().fg(Color::Yellow)),
        ConnectionState::Connected => {
            Span::styled("Connected", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        },
    };

    let mut info = String::new();
    if let Some(user) = app.user() {
        info.push_str(&format!(" | {}", user.display_name));
    }
    if !app.unread_counts().is_empty() {
        let badges: Vec<String> =
            app.unread_counts().iter().map(|(conversation, count)| format!("{conversation} ({count})")).collect();
        info.push_str(&format!(" | Unread: {}", badges.join(", ")));
    }
    if let Some(status) = app.status_message() {
        info.push_str(&format!(" | {status}"));
    }

    let status_line = Line::from(vec![
        Span::raw(" "),
        connection_status,
        Span::styled(info, Style::default().fg(Color::Gray)),
    ]);

    let paragraph = Paragraph::new(status_line).style(Style::default().bg(Color::DarkGray).fg(Color::White));

    frame.render_widget(paragraph, area);
}
