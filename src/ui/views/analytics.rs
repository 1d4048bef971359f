use crate::crms::cached_client::CachedCrmsClient;
use crate::crms::types::{AnalyticsReport, AnalyticsRow, SchoolTerm};
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{cluster_color, fmt_pct, truncate};
use crate::ui::view::{View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// View for student performance analytics with externally computed clusters
pub struct AnalyticsView {
  client: CachedCrmsClient,
  hide_clusters: BTreeSet<String>,
  terms: Query<Vec<SchoolTerm>>,
  term_id: Option<i64>,
  query: Query<AnalyticsReport>,
  /// Set by `R`; the next fetch asks the backend to recompute clusters
  force_next: Arc<AtomicBool>,
  /// Scope to the active term once the term list first resolves
  term_autoselect: bool,
  list_state: ListState,
  search: SearchInput,
}

impl AnalyticsView {
  pub fn new(client: CachedCrmsClient, hide_clusters: BTreeSet<String>) -> Self {
    let terms_client = client.clone();
    let mut terms = Query::new(move || {
      let client = terms_client.clone();
      async move { client.school_terms().await.map_err(|e| e.to_string()) }
    });
    if let Some(cached) = client.peek_school_terms() {
      terms = terms.with_initial(cached.data);
    }
    terms.fetch();

    let force_next = Arc::new(AtomicBool::new(false));
    let mut query = Self::build_query(&client, None, Arc::clone(&force_next));
    query.fetch();

    Self {
      client,
      hide_clusters,
      terms,
      term_id: None,
      query,
      force_next,
      term_autoselect: true,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn build_query(
    client: &CachedCrmsClient,
    term_id: Option<i64>,
    force_next: Arc<AtomicBool>,
  ) -> Query<AnalyticsReport> {
    let client_for_query = client.clone();
    let query = Query::new(move || {
      let client = client_for_query.clone();
      let force = force_next.swap(false, Ordering::SeqCst);
      async move {
        client
          .analytics(term_id, force)
          .await
          .map_err(|e| e.to_string())
      }
    });

    match client.peek_analytics(term_id) {
      Some(cached) => query.with_initial(cached.data),
      None => query,
    }
  }

  /// Switch the term filter. Replacing the query supersedes whatever fetch
  /// the previous filter had in flight.
  fn set_term(&mut self, term_id: Option<i64>) {
    self.term_id = term_id;
    let mut query = Self::build_query(&self.client, self.term_id, Arc::clone(&self.force_next));
    query.fetch();
    self.query = query;
  }

  /// Cycle the term filter: all terms -> newest -> older -> ... -> all terms.
  fn cycle_term(&mut self) {
    self.term_autoselect = false;

    let mut ids: Vec<i64> = self
      .terms
      .data()
      .map(|terms| terms.iter().map(|t| t.term_id).collect())
      .unwrap_or_default();
    ids.sort_unstable_by(|a, b| b.cmp(a));
    if ids.is_empty() {
      return;
    }

    let next = match self.term_id {
      None => Some(ids[0]),
      Some(current) => ids
        .iter()
        .position(|&id| id == current)
        .and_then(|pos| ids.get(pos + 1))
        .copied(),
    };
    self.set_term(next);
  }

  fn term_label(&self) -> String {
    match self.term_id {
      None => "all terms".to_string(),
      Some(id) => self
        .terms
        .data()
        .and_then(|terms| terms.iter().find(|t| t.term_id == id))
        .map(|t| t.display_label())
        .unwrap_or_else(|| format!("term {}", id)),
    }
  }

  fn visible_rows(&self) -> Vec<&AnalyticsRow> {
    let report = self.query.data();
    let rows = report.map(|r| r.rows.as_slice()).unwrap_or(&[]);
    let needle = self.search.query().to_lowercase();

    rows
      .iter()
      .filter(|row| {
        if let Some(label) = row.cluster_badge() {
          if self.hide_clusters.contains(&label.to_lowercase()) {
            return false;
          }
        }
        if needle.is_empty() {
          return true;
        }
        row.full_name.to_lowercase().contains(&needle)
          || row
            .course_code
            .as_deref()
            .map(|c| c.to_lowercase().contains(&needle))
            .unwrap_or(false)
          || row
            .cluster_badge()
            .map(|c| c.to_lowercase().contains(&needle))
            .unwrap_or(false)
      })
      .collect()
  }

  fn title(&self, visible: usize) -> String {
    let clustering = self.query.data().map(|r| &r.clustering);
    let silhouette = clustering
      .and_then(|c| c.silhouette_score)
      .map(|s| format!(", silhouette {:.2}", s))
      .unwrap_or_default();
    let cluster_note = match clustering {
      Some(c) if !c.enabled => ", clustering off",
      _ => "",
    };

    match self.query.state() {
      QueryState::Loading => format!(" Analytics [{}] (loading...) ", self.term_label()),
      QueryState::Refreshing(_) => format!(
        " Analytics [{}] ({} students{}{}) (refreshing...) ",
        self.term_label(),
        visible,
        silhouette,
        cluster_note
      ),
      QueryState::Error(e) => format!(" Analytics [{}] (error: {}) ", self.term_label(), e),
      _ => format!(
        " Analytics [{}] ({} students{}{}) ",
        self.term_label(),
        visible,
        silhouette,
        cluster_note
      ),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let rows = self.visible_rows();
    let len = rows.len();
    let title = self.title(len);

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load analytics. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No students match the filter."
      } else {
        "No analytics rows for this term."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = rows
      .iter()
      .map(|row| {
        let badge = row.cluster_badge();
        let badge_span = match badge {
          Some(label) => Span::styled(
            format!("{:<20}", truncate(label, 20)),
            Style::default().fg(cluster_color(label)),
          ),
          None => Span::styled(format!("{:<20}", ""), Style::default()),
        };

        let line = Line::from(vec![
          Span::raw(format!("{:<26}", truncate(&row.full_name, 26))),
          Span::raw(" "),
          Span::styled(
            format!(
              "{:<16}",
              truncate(
                &format!(
                  "{} {}",
                  row.course_code.as_deref().unwrap_or("-"),
                  row.section_code.as_deref().unwrap_or("")
                ),
                16
              )
            ),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::raw(format!("att {:>7}", fmt_pct(row.attendance_percentage))),
          Span::raw("  "),
          Span::raw(format!("avg {:>7}", fmt_pct(row.average_score))),
          Span::raw("  "),
          Span::raw(format!(
            "sub {:>7}",
            fmt_pct(row.submission_rate.map(|r| r * 100.0))
          )),
          Span::raw("  "),
          badge_span,
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

impl View for AnalyticsView {
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
      KeyCode::Char('t') => {
        self.cycle_term();
      }
      KeyCode::Char('r') => {
        self.query.refetch();
      }
      KeyCode::Char('R') => {
        // Ask the backend to re-run clustering, not just re-serve its cache.
        self.force_next.store(true, Ordering::SeqCst);
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
    format!("Analytics [{}]", self.term_label())
  }

  fn tick(&mut self) {
    if self.terms.poll() && self.term_autoselect {
      // First resolution of the term list: scope to the active term, the way
      // the dashboards open by default.
      let active_id = self
        .terms
        .data()
        .and_then(|terms| SchoolTerm::pick_active(terms))
        .map(|t| t.term_id);
      self.term_autoselect = false;
      if active_id.is_some() {
        self.set_term(active_id);
      }
    }
    self.query.poll();
  }
}
