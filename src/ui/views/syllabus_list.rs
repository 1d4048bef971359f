use crate::crms::cached_client::CachedCrmsClient;
use crate::crms::types::{ApprovalStatus, SyllabusRecord};
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{approval_color, truncate};
use crate::ui::view::{View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// View for the syllabus approval queue
pub struct SyllabusListView {
  client: CachedCrmsClient,
  query: Query<Vec<SyllabusRecord>>,
  /// In-flight approval, if any; resolves to the approved syllabus id
  approving: Option<Query<i64>>,
  status_note: Option<String>,
  list_state: ListState,
  search: SearchInput,
}

impl SyllabusListView {
  pub fn new(client: CachedCrmsClient) -> Self {
    let client_for_query = client.clone();
    let mut query = Query::new(move || {
      let client = client_for_query.clone();
      async move { client.syllabi().await.map_err(|e| e.to_string()) }
    });
    if let Some(cached) = client.peek_syllabi() {
      query = query.with_initial(cached.data);
    }
    query.fetch();

    Self {
      client,
      query,
      approving: None,
      status_note: None,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn filtered(&self) -> Vec<&SyllabusRecord> {
    let all = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    let needle = self.search.query().to_lowercase();
    if needle.is_empty() {
      return all.iter().collect();
    }
    all
      .iter()
      .filter(|s| {
        s.title.to_lowercase().contains(&needle)
          || s.course_code.to_lowercase().contains(&needle)
          || s.section_code.to_lowercase().contains(&needle)
          || s
            .faculty_name
            .as_deref()
            .map(|f| f.to_lowercase().contains(&needle))
            .unwrap_or(false)
      })
      .collect()
  }

  fn approve_selected(&mut self) {
    if self.approving.is_some() {
      return;
    }
    let Some(idx) = self.list_state.selected() else {
      return;
    };
    let Some((id, title, status)) = self
      .filtered()
      .get(idx)
      .map(|s| (s.syllabus_id, s.title.clone(), s.approval_status))
    else {
      return;
    };
    if status != ApprovalStatus::Pending {
      self.status_note = Some(format!(
        "{} is {}, only pending syllabi can be approved",
        title,
        status.as_str()
      ));
      return;
    }

    let client = self.client.clone();
    let mut approve = Query::new(move || {
      let client = client.clone();
      async move {
        client
          .approve_syllabus(id)
          .await
          .map(|_| id)
          .map_err(|e| e.to_string())
      }
    });
    approve.fetch();
    self.approving = Some(approve);
    self.status_note = None;
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let syllabi = self.filtered();
    let len = syllabi.len();
    let pending = syllabi
      .iter()
      .filter(|s| s.approval_status == ApprovalStatus::Pending)
      .count();

    let title = match self.query.state() {
      QueryState::Loading => " Syllabi (loading...) ".to_string(),
      QueryState::Refreshing(_) => format!(" Syllabi ({}, {} pending) (refreshing...) ", len, pending),
      QueryState::Error(e) => format!(" Syllabi (error: {}) ", e),
      _ if self.approving.is_some() => format!(" Syllabi ({}, {} pending) (approving...) ", len, pending),
      _ => format!(" Syllabi ({}, {} pending) ", len, pending),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load syllabi. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No syllabi match the filter."
      } else {
        "No syllabi awaiting review."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = syllabi
      .iter()
      .map(|syllabus| {
        let status = syllabus.approval_status;
        let line = Line::from(vec![
          Span::styled(
            format!("{:<10}", truncate(status.as_str(), 10)),
            Style::default().fg(approval_color(status)),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", syllabus.course_code),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", truncate(&syllabus.section_code, 10)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<36}", truncate(&syllabus.title, 36))),
          Span::raw(" "),
          Span::styled(
            truncate(syllabus.faculty_name.as_deref().unwrap_or("-"), 22),
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

    if let Some(note) = &self.status_note {
      let note_area = Rect::new(area.x + 2, area.y + area.height.saturating_sub(2), area.width.saturating_sub(4), 1);
      frame.render_widget(
        Paragraph::new(note.as_str()).style(Style::default().fg(Color::Yellow)),
        note_area,
      );
    }
  }
}

impl View for SyllabusListView {
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
      KeyCode::Char('a') => {
        self.approve_selected();
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
    "Syllabi".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();

    if let Some(approve) = &mut self.approving {
      if approve.poll() {
        match approve.state() {
          QueryState::Success(id) => {
            self.status_note = Some(format!("Syllabus {} approved", id));
            // The approval invalidated the cached queue; refetch it.
            self.query.refetch();
          }
          QueryState::Error(e) => {
            self.status_note = Some(format!("Approval failed: {}", e));
          }
          _ => return,
        }
        self.approving = None;
      }
    }
  }
}
