mod input;
mod search_input;

pub use input::{InputResult, TextInput};
pub use search_input::{SearchEvent, SearchInput};

/// Result of offering a key event to a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<E> {
  /// Component consumed the key, nothing for the parent to do
  Handled,
  /// Component consumed the key and emits an event for the parent
  Event(E),
  /// Component did not handle the key
  NotHandled,
}
