use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, API host, scope, and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, api_url: &str, scope: &str) {
  // Extract host from URL
  let host = extract_host(api_url);

  let header = Line::from(vec![
    Span::styled(" crms ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", scope),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::raw("  "),
    // Shortcuts - keys and brackets highlighted, descriptions dimmed
    Span::styled("<:>", Style::default().fg(Color::Cyan)),
    Span::styled(" command", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("</>", Style::default().fg(Color::Cyan)),
    Span::styled(" filter", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<r>", Style::default().fg(Color::Cyan)),
    Span::styled(" refresh", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<q>", Style::default().fg(Color::Cyan)),
    Span::styled(" back", Style::default().fg(Color::DarkGray)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Extract the host from the API base URL
fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    assert_eq!(
      extract_host("https://crms.example.edu/api"),
      "crms.example.edu"
    );
    assert_eq!(extract_host("http://localhost:5000/api/"), "localhost:5000");
    assert_eq!(extract_host("crms.example.edu"), "crms.example.edu");
  }
}
