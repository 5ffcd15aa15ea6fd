//! Rendering of the app view.
//!
//! Left: the session log with the command line under it. Right: the AI
//! panel with prompt, suggestion and status. The log is plain text; it is
//! hard-wrapped here so that the newest output is always the bottom row.

use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::{Style, Stylize},
    text::Line,
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::app::{App, Focus, ViewState};

pub mod layout;

pub use layout::Layouts;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let view = self.view();
        let outer_block = Layouts::outer_block().title(title(view).bold());
        outer_block.render(area, buf);

        let layouts = Layouts::split(area);
        render_log(view, layouts.log, buf);
        render_input(
            " Command ",
            &view.command_input,
            view.focus == Focus::Command,
            layouts.command,
            buf,
        );
        render_input(
            " Ask AI ",
            &view.prompt_input,
            view.focus == Focus::Prompt,
            layouts.prompt,
            buf,
        );
        render_suggestion(view, layouts.suggestion, buf);
        render_status(view, layouts.status, buf);
    }
}

/// Where the cursor belongs: end of the focused input.
pub fn cursor_position(app: &App, area: Rect) -> Option<Position> {
    let view = app.view();
    let layouts = Layouts::split(area);
    let (rect, text) = match view.focus {
        Focus::Command => (layouts.command, &view.command_input),
        Focus::Prompt => (layouts.prompt, &view.prompt_input),
    };
    let inner = input_block(" ", false).inner(rect);
    if inner.width == 0 || inner.height == 0 {
        return None;
    }
    let shown = visible_tail(text, inner.width as usize - 1).chars().count() as u16;
    Some(Position::new(inner.x + shown, inner.y))
}

fn title(view: &ViewState) -> Line<'static> {
    let state = if view.connected { "connected" } else { "offline" };
    if view.target.is_empty() {
        Line::from(format!(" remote-pilot [{state}] "))
    } else {
        Line::from(format!(" remote-pilot {} [{state}] ", view.target))
    }
}

fn input_block(title: &str, focused: bool) -> Block<'_> {
    let block = Block::new().borders(Borders::ALL).title(title);
    if focused {
        block.border_style(Style::new().cyan())
    } else {
        block
    }
}

fn render_log(view: &ViewState, area: Rect, buf: &mut Buffer) {
    let rows = tail_rows(&view.log, area.width as usize, area.height as usize);
    Paragraph::new(rows.into_iter().map(Line::from).collect::<Vec<_>>()).render(area, buf);
}

fn render_input(title: &str, text: &str, focused: bool, area: Rect, buf: &mut Buffer) {
    let block = input_block(title, focused);
    let inner = block.inner(area);
    block.render(area, buf);
    let shown = visible_tail(text, (inner.width as usize).saturating_sub(1));
    Paragraph::new(shown).render(inner, buf);
}

fn render_suggestion(view: &ViewState, area: Rect, buf: &mut Buffer) {
    let block = Block::new().borders(Borders::ALL).title(" Suggestion ");
    let body = if view.is_generating() {
        Line::from("Generating ...".italic())
    } else if view.suggestion.starts_with("Error: ") {
        Line::from(view.suggestion.as_str().red())
    } else {
        Line::from(view.suggestion.as_str().green())
    };
    Paragraph::new(body)
        .block(block)
        .wrap(Wrap { trim: false })
        .render(area, buf);
}

fn render_status(view: &ViewState, area: Rect, buf: &mut Buffer) {
    let hints = if view.confirm_enabled {
        "Tab focus | Enter send/ask | Ctrl+Y run suggestion | Ctrl+Q quit"
    } else {
        "Tab focus | Enter send/ask | Ctrl+Q quit"
    };
    let line = match &view.status {
        Some(status) => Line::from(status.as_str().yellow()),
        None => Line::from(hints.dark_gray()),
    };
    Paragraph::new(line)
        .block(Block::new().borders(Borders::ALL))
        .render(area, buf);
}

/// Hard-wrap `text` to `width` columns and keep the last `height` rows.
fn tail_rows(text: &str, width: usize, height: usize) -> Vec<String> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut rows: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
            continue;
        }
        rows.extend(chars.chunks(width).map(|chunk| chunk.iter().collect::<String>()));
    }
    let skip = rows.len().saturating_sub(height);
    rows.split_off(skip)
}

/// The last `max_chars` characters of `text`.
fn visible_tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}
