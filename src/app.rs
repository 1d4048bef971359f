use crate::cache::PersistentStore;
use crate::commands::{self, Command};
use crate::config::Config;
use crate::crms::cached_client::CachedCrmsClient;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{
  AnalyticsView, ClassListView, DashboardView, DepartmentListView, SyllabusListView, TermListView,
};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::info;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Application configuration
  config: Config,

  /// Cached API client shared by every view
  client: CachedCrmsClient,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let client = CachedCrmsClient::new(&config)?;
    let root: Box<dyn View> = Box::new(DashboardView::new(client.clone()));

    Ok(Self {
      view_stack: vec![root],
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      config,
      client,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));

    // Main loop
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        if let Some(view) = self.view_stack.last_mut() {
          view.tick();
        }
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    // Ctrl-C quits from any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char(':') {
      self.mode = Mode::Command;
      self.command_input.clear();
      self.selected_suggestion = 0;
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };

    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0; // Reset selection on input change
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0; // Reset selection on input change
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    // Execute either the selected suggestion or the raw input
    let suggestions = commands::get_suggestions(&self.command_input);
    let cmd = if !suggestions.is_empty() && self.selected_suggestion < suggestions.len() {
      suggestions[self.selected_suggestion].name.to_string()
    } else {
      self.command_input.trim().to_lowercase()
    };

    match cmd.as_str() {
      "dashboard" => {
        self.switch_root(Box::new(DashboardView::new(self.client.clone())));
      }
      "classes" => {
        self.switch_root(Box::new(ClassListView::new(
          self.client.clone(),
          self.config.faculty_id,
        )));
      }
      "syllabi" => {
        self.switch_root(Box::new(SyllabusListView::new(self.client.clone())));
      }
      "analytics" => {
        self.switch_root(Box::new(AnalyticsView::new(
          self.client.clone(),
          self.config.analytics.hide_clusters.clone(),
        )));
      }
      "terms" => {
        self.switch_root(Box::new(TermListView::new(self.client.clone())));
      }
      "departments" => {
        self.switch_root(Box::new(DepartmentListView::new(self.client.clone())));
      }
      "cache-clear" => {
        self.client.cache().memory().clear_all();
        self.client.cache().store().clear_all();
        info!("cleared both cache tiers");
      }
      "quit" => {
        self.should_quit = true;
      }
      _ => {
        // Unknown command
      }
    }
    self.command_input.clear();
  }

  fn switch_root(&mut self, view: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(view);
  }

  // Accessors for UI rendering
  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn api_url(&self) -> &str {
    self.client.base_url()
  }

  /// What the header shows as the current scope: explicit title, configured
  /// department, or a neutral default.
  pub fn scope_label(&self) -> String {
    self
      .config
      .title
      .clone()
      .or_else(|| self.config.default_department.clone())
      .unwrap_or_else(|| "all departments".to_string())
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}
