use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use crate::tui::app::{Action, App, Mode, Tab};

/// Polls for one key press and applies it. Remote work is handed back to the
/// caller.
pub fn handle_events(app: &mut App, timeout: Duration) -> Result<Option<Action>> {
    if event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(handle_key(app, key));
            }
        }
    }
    Ok(None)
}

pub fn handle_key(app: &mut App, key: KeyEvent) -> Option<Action> {
    if app.alert.is_some() {
        app.alert = None;
        return None;
    }

    let field_open = match &app.mode {
        Mode::Browse => return browse_key(app, key),
        Mode::Search => {
            search_key(app, key);
            return None;
        }
        Mode::ConfirmDelete { .. } => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
                _ => app.cancel(),
            }
            return None;
        }
        Mode::Edit(editor) => editor.input.is_some(),
    };

    if field_open {
        field_key(app, key);
    } else {
        form_key(app, key);
    }
    None
}

fn browse_key(app: &mut App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Right | KeyCode::Tab => app.next_tab(),
        KeyCode::Left | KeyCode::BackTab => app.previous_tab(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Char('/') if app.kind().is_some() => app.mode = Mode::Search,
        KeyCode::Char('c') => app.cycle_category(),
        KeyCode::Char('d') => app.toggle_dev_mode(),
        KeyCode::Char('n') => app.open_new(),
        KeyCode::Char('e') | KeyCode::Enter => app.open_edit(),
        KeyCode::Char('x') if app.tab() == Tab::Events => {
            if app.wiki.dev_mode() {
                return app.selected_id().map(Action::DeleteEvent);
            }
            app.status = "Dev mode is off (press d)".to_string();
        }
        KeyCode::Char('x') => app.ask_delete(),
        KeyCode::Char('r') if app.remote_enabled => return Some(Action::ReloadRemote),
        _ => {}
    }
    None
}

fn search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Esc => app.mode = Mode::Browse,
        KeyCode::Backspace => app.pop_query(),
        KeyCode::Char(c) => app.push_query(c),
        _ => {}
    }
}

fn form_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => app.editor_save(),
        KeyCode::Esc => app.cancel(),
        KeyCode::Down | KeyCode::Tab => app.editor_move(true),
        KeyCode::Up | KeyCode::BackTab => app.editor_move(false),
        KeyCode::Enter => app.editor_open_field(),
        _ => {}
    }
}

fn field_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.editor_commit_field(),
        KeyCode::Esc => app.editor_cancel_field(),
        KeyCode::Backspace => {
            if let Some(input) = app.editor().and_then(|e| e.input.as_mut()) {
                input.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(input) = app.editor().and_then(|e| e.input.as_mut()) {
                input.push(c);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::records::RecordKind;
    use crate::engine::wiki::Wiki;

    fn press(app: &mut App, code: KeyCode) -> Option<Action> {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn search_mode_captures_letters() {
        let mut app = App::new(Config::default(), Wiki::seeded());
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "qd");
        assert_eq!(app.query, "qd");
        assert!(!app.should_quit);
        assert!(!app.wiki.dev_mode());

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn create_a_map_from_the_keyboard() {
        let mut app = App::new(Config::default(), Wiki::seeded());
        while app.kind() != Some(RecordKind::Map) {
            press(&mut app, KeyCode::Right);
        }
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));

        // id is generated; move to name
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Frozen Lake");
        press(&mut app, KeyCode::Enter);
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));

        assert!(matches!(app.mode, Mode::Browse));
        assert_eq!(app.wiki.len(RecordKind::Map), 3);
        assert!(app.wiki.maps.list().iter().any(|m| m.name == "Frozen Lake"));
    }

    #[test]
    fn alert_swallows_the_next_key() {
        let mut app = App::new(Config::default(), Wiki::seeded());
        app.show_alert("Remote write failed");
        press(&mut app, KeyCode::Char('q'));
        assert!(app.alert.is_none());
        assert!(!app.should_quit);
    }

    #[test]
    fn event_delete_is_handed_to_the_caller() {
        let mut app = App::new(Config::default(), Wiki::seeded());
        app.events = vec![crate::remote::events::WeeklyEvent { id: "e1".into(), ..Default::default() }];
        while app.tab() != Tab::Events {
            press(&mut app, KeyCode::Right);
        }
        assert_eq!(press(&mut app, KeyCode::Char('x')), None);
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(press(&mut app, KeyCode::Char('x')), Some(Action::DeleteEvent("e1".into())));
    }
}
