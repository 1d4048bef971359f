use crate::crms::cached_client::CachedCrmsClient;
use crate::crms::types::ClassRecord;
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::ClassDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// View for browsing section-courses taught by the configured faculty member
pub struct ClassListView {
  client: CachedCrmsClient,
  faculty_id: Option<i64>,
  query: Query<Vec<ClassRecord>>,
  list_state: ListState,
  search: SearchInput,
}

impl ClassListView {
  pub fn new(client: CachedCrmsClient, faculty_id: Option<i64>) -> Self {
    let mut query = match faculty_id {
      None => {
        // Nothing to list without a faculty id; render the hint instead.
        Query::new(|| async { Ok(Vec::new()) })
      }
      Some(id) => {
        let client_for_query = client.clone();
        let query = Query::new(move || {
          let client = client_for_query.clone();
          async move { client.faculty_classes(id).await.map_err(|e| e.to_string()) }
        });
        // Paint whatever a cache tier has before the network answers.
        match client.peek_faculty_classes(id) {
          Some(cached) => query.with_initial(cached.data),
          None => query,
        }
      }
    };

    if faculty_id.is_some() {
      query.fetch();
    }

    Self {
      client,
      faculty_id,
      query,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn filtered(&self) -> Vec<&ClassRecord> {
    let all = self.query.data().map(|v| v.as_slice()).unwrap_or(&[]);
    let needle = self.search.query().to_lowercase();
    if needle.is_empty() {
      return all.iter().collect();
    }
    all
      .iter()
      .filter(|c| {
        c.course_title.to_lowercase().contains(&needle)
          || c.course_code.to_lowercase().contains(&needle)
          || c.section_code.to_lowercase().contains(&needle)
          || c
            .faculty_name
            .as_deref()
            .map(|f| f.to_lowercase().contains(&needle))
            .unwrap_or(false)
      })
      .collect()
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let classes = self.filtered();
    let len = classes.len();

    let title = match self.query.state() {
      QueryState::Loading => " Classes (loading...) ".to_string(),
      QueryState::Refreshing(_) => format!(" Classes ({}) (refreshing...) ", len),
      QueryState::Error(e) => format!(" Classes (error: {}) ", e),
      _ => format!(" Classes ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.faculty_id.is_none() {
        "No faculty id configured. Set faculty_id in config or use --faculty."
      } else if self.query.is_error() {
        "Failed to load classes. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No classes match the filter."
      } else {
        "No classes found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = classes
      .iter()
      .map(|class| {
        let line = Line::from(vec![
          Span::styled(
            format!("{:<10}", class.course_code),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", truncate(&class.section_code, 10)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<40}", truncate(&class.course_title, 40))),
          Span::raw(" "),
          Span::styled(
            truncate(class.faculty_name.as_deref().unwrap_or("-"), 24),
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

impl View for ClassListView {
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
      KeyCode::Enter => {
        if let Some(idx) = self.list_state.selected() {
          if let Some(class) = self.filtered().get(idx) {
            return ViewAction::Push(Box::new(ClassDetailView::new(
              self.client.clone(),
              class.section_course_id,
              format!("{} {}", class.course_code, class.section_code),
            )));
          }
        }
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
    "Classes".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }
}
