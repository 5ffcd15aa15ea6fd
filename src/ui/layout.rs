use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::{Block, Borders};

/// Width of the AI panel on the right.
const AI_PANEL_WIDTH: u16 = 50;

/// Screen regions, all inside the outer border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layouts {
    pub log: Rect,
    pub command: Rect,
    pub prompt: Rect,
    pub suggestion: Rect,
    pub status: Rect,
}

impl Layouts {
    pub fn outer_block<'a>() -> Block<'a> {
        Block::new().borders(Borders::ALL)
    }

    pub fn split(area: Rect) -> Self {
        let inner = Self::outer_block().inner(area);
        let [left, right] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(AI_PANEL_WIDTH)])
            .areas(inner);
        let [log, command] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .areas(left);
        let [prompt, suggestion, status] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(3)])
            .areas(right);
        Self {
            log,
            command,
            prompt,
            suggestion,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_fit_inside_border() {
        let area = Rect::new(0, 0, 120, 40);
        let layouts = Layouts::split(area);
        assert_eq!(layouts.prompt.width, AI_PANEL_WIDTH);
        assert_eq!(layouts.command.height, 3);
        assert_eq!(layouts.log.x, 1);
        assert_eq!(layouts.log.width + AI_PANEL_WIDTH, 118);
        assert_eq!(layouts.command.bottom(), 39);
    }
}
