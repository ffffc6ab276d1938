//! Chat area
//!
//! Displays messages in the active conversation.

use std::collections::BTreeMap;

use agora_app::App;
use agora_proto::UserId;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
};

const BORDER_SIZE: u16 = 2;

/// Render the chat area.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let title = app
        .conversation()
        .map_or_else(|| " No conversation ".to_string(), |view| format!(" {} ", view.conversation_id));

    let block = Block::default().borders(Borders::ALL).title(title);

    let items: Vec<ListItem> = match app.conversation() {
        None => vec![hint("Open a conversation with /open <id> [peer]")],
        Some(view) if view.loading => vec![hint("Loading history...")],
        Some(view) => {
            let names = display_names(app);
            view.messages
                .iter()
                .map(|msg| {
                    let name = names.get(&msg.sender_id).copied().unwrap_or(msg.sender_id.as_str());
                    let color = if app.user().is_some_and(|u| u.id == msg.sender_id) {
                        Color::Cyan
                    } else {
                        Color::Green
                    };

                    ListItem::new(Line::from(vec![
                        Span::styled(format!("<{name}>"), Style::default().fg(color).add_modifier(Modifier::BOLD)),
                        Span::raw(" "),
                        Span::raw(msg.content.as_str()),
                    ]))
                })
                .collect()
        },
    };

    let visible_height = area.height.saturating_sub(BORDER_SIZE) as usize;
    let skip = items.len().saturating_sub(visible_height);
    let visible_items: Vec<_> = items.into_iter().skip(skip).collect();

    let list = List::new(visible_items).block(block);

    frame.render_widget(list, area);
}

fn hint(text: &str) -> ListItem<'_> {
    ListItem::new(Line::from(Span::styled(text, Style::default().fg(Color::DarkGray))))
}

/// Names for everyone the app knows: the contacts and the current user.
fn display_names(app: &App) -> BTreeMap<&UserId, &str> {
    let mut names: BTreeMap<&UserId, &str> =
        app.contacts().into_iter().map(|c| (&c.profile.id, c.profile.display_name.as_str())).collect();
    if let Some(user) = app.user() {
        names.insert(&user.id, user.display_name.as_str());
    }
    names
}
