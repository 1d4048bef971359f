use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, selection) and return actions
/// for the App to execute. This creates a clean delegation chain:
/// App → View → Components
///
/// Views that load data asynchronously own `Query<T>` values and poll them in
/// the tick() method.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to allow views to poll async queries
  fn tick(&mut self) {}
}
