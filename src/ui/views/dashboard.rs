use crate::crms::cached_client::CachedCrmsClient;
use crate::crms::types::DashboardStats;
use crate::query::{Query, QueryState};
use crate::ui::renderfns::fmt_pct;
use crate::ui::view::{View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Landing view: headline numbers as stat cards
pub struct DashboardView {
  query: Query<DashboardStats>,
}

impl DashboardView {
  pub fn new(client: CachedCrmsClient) -> Self {
    let client_for_query = client.clone();
    let mut query = Query::new(move || {
      let client = client_for_query.clone();
      async move { client.dashboard_stats().await.map_err(|e| e.to_string()) }
    });
    if let Some(cached) = client.peek_dashboard_stats() {
      query = query.with_initial(cached.data);
    }
    query.fetch();

    Self { query }
  }

  fn render_cards(&self, frame: &mut Frame, area: Rect, stats: &DashboardStats) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(5), Constraint::Length(5), Constraint::Min(0)])
      .split(area);

    let top = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([
        Constraint::Percentage(33),
        Constraint::Percentage(34),
        Constraint::Percentage(33),
      ])
      .split(rows[0]);
    let bottom = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([
        Constraint::Percentage(33),
        Constraint::Percentage(34),
        Constraint::Percentage(33),
      ])
      .split(rows[1]);

    let cards: [(&str, String, Color); 6] = [
      ("Classes", stats.total_classes.to_string(), Color::Cyan),
      ("Students", stats.total_students.to_string(), Color::Cyan),
      ("Faculty", stats.total_faculty.to_string(), Color::Cyan),
      (
        "Pending syllabi",
        stats.pending_syllabi.to_string(),
        Color::Yellow,
      ),
      (
        "Approved syllabi",
        stats.approved_syllabi.to_string(),
        Color::Green,
      ),
      ("Attendance", fmt_pct(stats.attendance_rate), Color::Blue),
    ];

    for (i, (label, value, color)) in cards.iter().enumerate() {
      let cell = if i < 3 { top[i] } else { bottom[i - 3] };
      let card = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
          value.clone(),
          Style::default().fg(*color).bold(),
        ))
        .alignment(Alignment::Center),
      ])
      .block(
        Block::default()
          .title(format!(" {} ", label))
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::DarkGray)),
      );
      frame.render_widget(card, cell);
    }
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => " Dashboard (loading...) ".to_string(),
      QueryState::Refreshing(_) => " Dashboard (refreshing...) ".to_string(),
      QueryState::Error(e) => format!(" Dashboard (error: {}) ", e),
      _ => " Dashboard ".to_string(),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match self.query.data() {
      Some(stats) => {
        let stats = stats.clone();
        self.render_cards(frame, inner, &stats);
      }
      None => {
        let content = if self.query.is_error() {
          "Failed to load dashboard stats. Press 'r' to retry."
        } else {
          "Loading dashboard..."
        };
        frame.render_widget(
          Paragraph::new(content).style(Style::default().fg(Color::DarkGray)),
          inner,
        );
      }
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }
}
