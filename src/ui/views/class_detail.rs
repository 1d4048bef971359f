use crate::crms::cached_client::CachedCrmsClient;
use crate::crms::types::StudentRecord;
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// View for the students enrolled in one section-course
pub struct ClassDetailView {
  label: String,
  query: Query<Vec<StudentRecord>>,
  list_state: ListState,
  search: SearchInput,
}

impl ClassDetailView {
  pub fn new(client: CachedCrmsClient, section_course_id: i64, label: String) -> Self {
    let client_for_query = client.clone();
    let mut query = Query::new(move || {
      let client = client_for_query.clone();
      async move {
        client
          .section_students(section_course_id)
          .await
          .map_err(|e| e.to_string())
      }
    });
    if let Some(cached) = client.peek_section_students(section_course_id) {
      query = query.with_initial(cached.data);
    }
    query.fetch();

    Self {
      label,
      query,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn filtered(&self) -> Vec<&StudentRecord> {
    let all = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    let needle = self.search.query().to_lowercase();
    if needle.is_empty() {
      return all.iter().collect();
    }
    all
      .iter()
      .filter(|s| {
        s.full_name.to_lowercase().contains(&needle)
          || s.student_number.to_lowercase().contains(&needle)
      })
      .collect()
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let students = self.filtered();
    let len = students.len();

    let title = match self.query.state() {
      QueryState::Loading => format!(" {} (loading...) ", self.label),
      QueryState::Refreshing(_) => format!(" {} ({} students) (refreshing...) ", self.label, len),
      QueryState::Error(e) => format!(" {} (error: {}) ", self.label, e),
      _ => format!(" {} ({} students) ", self.label, len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load students. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No students match the filter."
      } else {
        "No students enrolled."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = students
      .iter()
      .map(|student| {
        // Photo marker: set even when only the minimized projection is
        // cached and the blob itself is not in memory.
        let photo_marker = if student.has_photo { "*" } else { " " };
        let line = Line::from(vec![
          Span::styled(
            format!("{:<12}", student.student_number),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(photo_marker, Style::default().fg(Color::Green)),
          Span::raw(" "),
          Span::raw(format!("{:<32}", truncate(&student.full_name, 32))),
          Span::raw(" "),
          Span::styled(
            truncate(student.contact_email.as_deref().unwrap_or("-"), 30),
            Style::default().fg(Color::DarkGray),
          ),
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
}

impl View for ClassDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key) {
      KeyResult::Handled | KeyResult::Event(_) => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

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
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.label.clone()
  }

  fn tick(&mut self) {
    self.query.poll();
  }
}
