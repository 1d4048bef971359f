use crate::crms::cached_client::CachedCrmsClient;
use crate::crms::types::SchoolTerm;
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::view::{View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// View for school terms
pub struct TermListView {
  query: Query<Vec<SchoolTerm>>,
  list_state: ListState,
}

impl TermListView {
  pub fn new(client: CachedCrmsClient) -> Self {
    let client_for_query = client.clone();
    let mut query = Query::new(move || {
      let client = client_for_query.clone();
      async move { client.school_terms().await.map_err(|e| e.to_string()) }
    });
    if let Some(cached) = client.peek_school_terms() {
      query = query.with_initial(cached.data);
    }
    query.fetch();

    Self {
      query,
      list_state: ListState::default(),
    }
  }

  fn terms(&self) -> Vec<&SchoolTerm> {
    let mut terms: Vec<&SchoolTerm> = self
      .query
      .data()
      .map(|v| v.iter().collect())
      .unwrap_or_default();
    terms.sort_by(|a, b| b.term_id.cmp(&a.term_id));
    terms
  }
}

impl View for TermListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => {
        self.query.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let terms = self.terms();
    let len = terms.len();

    let title = match self.query.state() {
      QueryState::Loading => " School Terms (loading...) ".to_string(),
      QueryState::Refreshing(_) => format!(" School Terms ({}) (refreshing...) ", len),
      QueryState::Error(e) => format!(" School Terms (error: {}) ", e),
      _ => format!(" School Terms ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load school terms. Press 'r' to retry."
      } else {
        "No school terms found."
      };
      frame.render_widget(
        Paragraph::new(content)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let items: Vec<ListItem> = terms
      .iter()
      .map(|term| {
        let active_marker = if term.is_active {
          Span::styled("active", Style::default().fg(Color::Green))
        } else {
          Span::raw("      ")
        };
        let line = Line::from(vec![
          Span::styled(
            format!("{:<6}", term.term_id),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(format!("{:<28}", term.display_label())),
          active_marker,
        ]);
        ListItem::new(line)
      })
      .collect();

    ensure_valid_selection(&mut self.list_state, len);
    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn breadcrumb_label(&self) -> String {
    "Terms".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }
}
