//! Contacts sidebar
//!
//! Displays the contact list with presence markers.

use agora_app::App;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
};

const ONLINE_MARKER: &str = "● ";
const OFFLINE_MARKER: &str = "○ ";

/// Render the contacts sidebar.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .contacts()
        .into_iter()
        .map(|contact| {
            let (marker, style) = if contact.online {
                (ONLINE_MARKER, Style::default().fg(Color::Green))
            } else {
                (OFFLINE_MARKER, Style::default().fg(Color::DarkGray))
            };

            ListItem::new(Line::from(vec![
                Span::styled(marker, style),
                Span::raw(contact.profile.display_name.as_str()),
            ]))
        })
        .collect();

    let block = Block::default().borders(Borders::ALL).title(" Contacts ");
    let list = List::new(items).block(block);

    frame.render_widget(list, area);
}
