pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::{App, Mode};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, ListState, Paragraph};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], app.api_url(), &app.scope_label());

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }

  draw_status_bar(frame, chunks[2], app);

  if *app.mode() == Mode::Command {
    draw_command_overlay(frame, chunks[1], app);
  }
}

/// Clamp a list selection to the current item count.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(selected) if selected >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.mode() {
    Mode::Normal => {
      let breadcrumb = app.view_breadcrumb().join(" > ");
      let hint = " :command  /filter  j/k:nav  Enter:select  q:back  Ctrl-C:quit";
      (
        format!(" {} {}", breadcrumb, hint),
        Style::default().fg(Color::DarkGray),
      )
    }
    Mode::Command => {
      let cmd = format!(":{}", app.command_input());
      (cmd, Style::default().fg(Color::Yellow))
    }
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}

/// Command palette overlay: input suggestions anchored above the status bar.
fn draw_command_overlay(frame: &mut Frame, area: Rect, app: &App) {
  let suggestions = app.autocomplete_suggestions();
  if suggestions.is_empty() {
    return;
  }

  let rows = suggestions.len().min(8) as u16;
  let height = rows + 2;
  let width = (area.width * 60 / 100).clamp(30, 56);
  if area.height < height {
    return;
  }

  let overlay_area = Rect::new(
    area.x + 1,
    area.y + area.height - height,
    width,
    height,
  );
  frame.render_widget(Clear, overlay_area);

  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(" Command ");
  let inner = block.inner(overlay_area);
  frame.render_widget(block, overlay_area);

  let lines: Vec<Line> = suggestions
    .iter()
    .take(rows as usize)
    .enumerate()
    .map(|(i, cmd)| {
      let selected = i == app.selected_suggestion();
      let name_style = if selected {
        Style::default().fg(Color::Black).bg(Color::Yellow)
      } else {
        Style::default().fg(Color::Yellow)
      };
      Line::from(vec![
        Span::styled(format!(" {:<12}", cmd.name), name_style),
        Span::styled(
          format!(" {}", cmd.description),
          Style::default().fg(Color::DarkGray),
        ),
      ])
    })
    .collect();

  frame.render_widget(Paragraph::new(lines), inner);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ensure_valid_selection_clamps() {
    let mut state = ListState::default();
    state.select(Some(5));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));
  }

  #[test]
  fn test_ensure_valid_selection_selects_first_by_default() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 4);
    assert_eq!(state.selected(), Some(0));
  }

  #[test]
  fn test_ensure_valid_selection_empty_list() {
    let mut state = ListState::default();
    state.select(Some(1));
    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }
}
