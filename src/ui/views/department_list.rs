use crate::crms::cached_client::CachedCrmsClient;
use crate::crms::types::Department;
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// View for departments
pub struct DepartmentListView {
  query: Query<Vec<Department>>,
  list_state: ListState,
}

impl DepartmentListView {
  pub fn new(client: CachedCrmsClient) -> Self {
    let client_for_query = client.clone();
    let mut query = Query::new(move || {
      let client = client_for_query.clone();
      async move { client.departments().await.map_err(|e| e.to_string()) }
    });
    if let Some(cached) = client.peek_departments() {
      query = query.with_initial(cached.data);
    }
    query.fetch();

    Self {
      query,
      list_state: ListState::default(),
    }
  }

  fn departments(&self) -> &[Department] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }
}

impl View for DepartmentListView {
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
    let len = self.departments().len();

    let title = match self.query.state() {
      QueryState::Loading => " Departments (loading...) ".to_string(),
      QueryState::Refreshing(_) => format!(" Departments ({}) (refreshing...) ", len),
      QueryState::Error(e) => format!(" Departments (error: {}) ", e),
      _ => format!(" Departments ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load departments. Press 'r' to retry."
      } else {
        "No departments found."
      };
      frame.render_widget(
        Paragraph::new(content)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let items: Vec<ListItem> = self
      .departments()
      .iter()
      .map(|dept| {
        let line = Line::from(vec![
          Span::styled(
            format!(
              "{:<8}",
              dept.department_abbreviation.as_deref().unwrap_or("-")
            ),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(truncate(&dept.name, 48)),
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
    "Departments".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }
}
