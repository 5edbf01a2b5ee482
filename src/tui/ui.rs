use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};
use tui_logger::{TuiLoggerLevelOutput, TuiLoggerWidget};

use crate::engine::cards::DetailLine;
use crate::tui::app::{App, EditorState, Mode, Tab};

fn panel(title: &str) -> Block<'_> {
    Block::default().borders(Borders::ALL).border_type(BorderType::Rounded).title(format!(" {} ", title))
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3), // Tabs
                Constraint::Min(0),    // Main content
                Constraint::Length(1), // Status bar
            ]
            .as_ref(),
        )
        .split(f.area());

    draw_header(f, app, chunks[0]);

    match app.tab() {
        Tab::Catalog(_) => draw_catalog(f, app, chunks[1]),
        Tab::Events => draw_events(f, app, chunks[1]),
        Tab::Settings => draw_settings(f, app, chunks[1]),
        Tab::Logs => draw_logs(f, app, chunks[1]),
    }

    draw_status_bar(f, app, chunks[2]);

    match &app.mode {
        Mode::Edit(editor) => draw_editor(f, editor),
        Mode::ConfirmDelete { kind, id } => {
            draw_popup(f, " Delete ", &format!("Delete {} {}?\n\ny: delete   any other key: cancel", kind, id), Color::Yellow)
        }
        _ => {}
    }

    if let Some(alert) = &app.alert {
        draw_popup(f, " Error ", &format!("{}\n\nPress any key", alert), Color::Red);
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = app
        .tabs
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let style = if i == app.tab_index {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::from(Span::styled(t.title(), style))
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(panel("Fish Wiki"))
        .select(app.tab_index)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    f.render_widget(tabs, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let status_style = if app.store_error.is_some() {
        Style::default().fg(Color::White).bg(Color::Red)
    } else if app.wiki.dev_mode() {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        Style::default().fg(Color::Black).bg(Color::Green)
    };

    let keys = match app.mode {
        Mode::Search => "Type to search | Enter/Esc: Done",
        Mode::Edit(_) => "Up/Down: Field | Enter: Edit field | Ctrl+S: Save | Esc: Close",
        _ => "Q: Quit | TAB: Switch | /: Search | C: Category | D: Dev | N/E/X: New/Edit/Delete",
    };
    let dev = if app.wiki.dev_mode() { "DEV" } else { "VIEW" };
    let status_bar = Paragraph::new(format!(" {} | {} | {} ", dev, app.status, keys)).style(status_style);
    f.render_widget(status_bar, area);
}

fn draw_catalog(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)].as_ref())
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(chunks[0]);

    let search_style = if matches!(app.mode, Mode::Search) {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let filter_line = Line::from(vec![
        Span::styled(format!("[{}] ", app.category_label()), Style::default().fg(Color::Magenta)),
        Span::styled(format!("/{}", app.query), search_style),
    ]);
    f.render_widget(Paragraph::new(filter_line).block(panel("Filter")), left[0]);

    let cards = app.cards();
    let items: Vec<ListItem> = cards
        .iter()
        .map(|card| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<8} ", card.id), Style::default().fg(Color::DarkGray)),
                Span::styled(card.title.clone(), Style::default().fg(Color::White)),
                Span::styled(format!("  {}", card.badge), Style::default().fg(Color::Yellow)),
                Span::styled(format!("  {}", card.summary), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();
    let title = format!("{} ({})", app.tab().title(), cards.len());
    let list = List::new(items)
        .block(panel(&title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");
    let mut state = ListState::default().with_selected((!cards.is_empty()).then_some(app.selected));
    f.render_stateful_widget(list, left[1], &mut state);

    draw_detail(f, &app.selected_detail(), chunks[1]);
}

fn draw_detail(f: &mut Frame, lines: &[DetailLine], area: Rect) {
    let text: Vec<Line> = lines
        .iter()
        .map(|l| {
            Line::from(vec![
                Span::styled(format!("{:<14}", l.label), Style::default().fg(Color::Cyan)),
                Span::raw(l.value.clone()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(text).block(panel("Detail")).wrap(Wrap { trim: false }), area);
}

fn draw_events(f: &mut Frame, app: &App, area: Rect) {
    if !app.remote_enabled {
        let p = Paragraph::new("Remote store is disabled. Set remote.enabled in config.toml.").block(panel("Weekly Events"));
        f.render_widget(p, area);
        return;
    }

    let now = Utc::now();
    let items: Vec<ListItem> = app
        .events
        .iter()
        .map(|e| {
            let (mark, style) = if e.is_active(now) {
                ("ACTIVE", Style::default().fg(Color::Green))
            } else {
                ("      ", Style::default().fg(Color::DarkGray))
            };
            let day = |d: Option<chrono::DateTime<Utc>>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "?".into());
            let targets = e.targets.iter().map(|t| app.wiki.item_label(t)).collect::<Vec<_>>().join(", ");
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", mark), style),
                Span::raw(format!("{} → {} ", day(e.start_date), day(e.end_date))),
                Span::styled(e.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(format!("  x{}  {}", e.rate_multiplier, targets), Style::default().fg(Color::Yellow)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(panel("Weekly Events (r: refresh, x: delete)"))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol(">> ");
    let mut state = ListState::default().with_selected((!app.events.is_empty()).then_some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_settings(f: &mut Frame, app: &App, area: Rect) {
    let Some(settings) = &app.settings else {
        let msg = if app.remote_enabled { "Loading shared settings... (r to retry)" } else { "Remote store is disabled." };
        f.render_widget(Paragraph::new(msg).block(panel("Shared Settings")), area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(area);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(34), Constraint::Percentage(33), Constraint::Percentage(33)].as_ref())
        .split(chunks[1]);

    let guide = Paragraph::new(settings.guide.content.clone()).block(panel("Guide")).wrap(Wrap { trim: false });
    f.render_widget(guide, chunks[0]);

    let links: Vec<ListItem> = settings
        .shop_links
        .links
        .iter()
        .map(|l| ListItem::new(Line::from(vec![Span::styled(format!("{} ", l.title), Style::default().fg(Color::Cyan)), Span::raw(l.url.clone())])))
        .collect();
    f.render_widget(List::new(links).block(panel("Shop Links")), right[0]);

    let food: Vec<ListItem> = settings
        .food_categories
        .categories
        .iter()
        .map(|(id, category)| ListItem::new(format!("{:<24} {}", app.wiki.item_name(id).unwrap_or(id), category)))
        .collect();
    f.render_widget(List::new(food).block(panel("Food Categories")), right[1]);

    let rates: Vec<ListItem> = settings
        .tackle_rates
        .rows
        .iter()
        .map(|row| {
            let cells = row.rates.iter().map(|(k, v)| format!("{} {}", k, v)).collect::<Vec<_>>().join("  ");
            ListItem::new(format!("{:<10} {}", row.tier, cells))
        })
        .collect();
    f.render_widget(List::new(rates).block(panel("Tackle Rates")), right[2]);
}

fn draw_logs(f: &mut Frame, app: &App, area: Rect) {
    let widget = TuiLoggerWidget::default()
        .block(panel("Logs"))
        .output_separator(' ')
        .output_timestamp(Some("%H:%M:%S".to_string()))
        .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
        .output_target(false)
        .style_error(Style::default().fg(Color::Red))
        .style_warn(Style::default().fg(Color::Yellow))
        .style_info(Style::default().fg(Color::Green))
        .style_debug(Style::default().fg(Color::Gray))
        .state(&app.logger_state);
    f.render_widget(widget, area);
}

fn draw_editor(f: &mut Frame, editor: &EditorState) {
    let area = centered_rect(80, 80, f.area());
    f.render_widget(Clear, area);

    let mode = if editor.draft.is_new() { "New" } else { "Edit" };
    let title = format!("{} {} {}", mode, editor.kind, editor.draft.id());

    let mut lines = Vec::new();
    for (i, spec) in editor.draft.fields().iter().enumerate() {
        let selected = i == editor.field_index;
        let label_style = if selected {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let marker = if spec.required { "*" } else { " " };
        let value = match (&editor.input, selected) {
            (Some(input), true) => Span::styled(format!("{}█", input), Style::default().fg(Color::Yellow)),
            _ => Span::raw(editor.draft.field_text(spec.key)),
        };
        lines.push(Line::from(vec![
            Span::raw(if selected { ">> " } else { "   " }),
            Span::styled(format!("{}{:<24}", marker, spec.label), label_style),
            value,
        ]));
        if let Some(error) = editor.errors.get(spec.key) {
            lines.push(Line::from(Span::styled(format!("      {}", error), Style::default().fg(Color::Red))));
        }
    }
    // Errors that belong to no listed field
    for (key, error) in &editor.errors {
        if editor.draft.schema().field(key).is_none() {
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        }
    }

    let p = Paragraph::new(lines).block(panel(&title).style(Style::default().fg(Color::White))).wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn draw_popup(f: &mut Frame, title: &str, message: &str, color: Color) {
    let area = centered_rect(50, 25, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .title(title)
        .style(Style::default().fg(color));
    f.render_widget(Paragraph::new(message.to_string()).block(block).wrap(Wrap { trim: true }), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
