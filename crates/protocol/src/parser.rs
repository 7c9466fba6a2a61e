use crate::event::Event;

/// Incremental event-stream parser: whole lines in, discrete events out.
///
/// The parser holds the in-progress field map between lines and is
/// restartable per connection. It assumes the caller delivers whole lines
/// (see [`crate::LineSplitter`] for chunk reassembly) without their
/// terminators.
#[derive(Debug, Default)]
pub struct EventParser {
    current: Event,
}

impl EventParser {
    /// Creates a parser with an empty in-progress event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line, returning a completed event when the line is the
    /// blank event delimiter.
    ///
    /// Comment lines (leading `:`) are discarded. A field line is split on
    /// the first `:` with a single leading space stripped from the value; a
    /// line without `:` is a bare field name with an empty value. Delimiters
    /// with no accumulated fields (for example after a comment-only block)
    /// produce nothing.
    pub fn feed_line(&mut self, line: &str) -> Option<Event> {
        if line.is_empty() {
            if self.current.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.current));
        }

        if line.starts_with(':') {
            return None;
        }

        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        self.current.push_field(name, value);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DATA_FIELD, EVENT_FIELD};

    #[test]
    fn test_single_event() {
        let mut parser = EventParser::new();
        assert_eq!(parser.feed_line("event: yield"), None);
        assert_eq!(parser.feed_line("data: MA=="), None);
        let event = parser.feed_line("").unwrap();
        assert_eq!(event.event_type(), Some("yield"));
        assert_eq!(event.data(), Some("MA=="));
    }

    #[test]
    fn test_comment_lines_ignored() {
        let mut parser = EventParser::new();
        assert_eq!(parser.feed_line(": ping"), None);
        assert_eq!(parser.feed_line(""), None);
        assert_eq!(parser.feed_line(": another comment"), None);
        assert_eq!(parser.feed_line("data: x"), None);
        let event = parser.feed_line("").unwrap();
        assert_eq!(event.data(), Some("x"));
    }

    #[test]
    fn test_repeated_data_joined_with_newline() {
        let mut parser = EventParser::new();
        parser.feed_line("data: first");
        parser.feed_line("data: second");
        let event = parser.feed_line("").unwrap();
        assert_eq!(event.data(), Some("first\nsecond"));
    }

    #[test]
    fn test_bare_field_has_empty_value() {
        let mut parser = EventParser::new();
        parser.feed_line("data");
        let event = parser.feed_line("").unwrap();
        assert_eq!(event.data(), Some(""));
    }

    #[test]
    fn test_value_keeps_extra_colons() {
        let mut parser = EventParser::new();
        parser.feed_line("data: ValueError: bad input");
        let event = parser.feed_line("").unwrap();
        assert_eq!(event.data(), Some("ValueError: bad input"));
    }

    #[test]
    fn test_parser_resets_between_events() {
        let mut parser = EventParser::new();
        parser.feed_line("event: yield");
        parser.feed_line("data: one");
        let first = parser.feed_line("").unwrap();
        parser.feed_line("event: exception");
        parser.feed_line("data: two");
        let second = parser.feed_line("").unwrap();
        assert_eq!(first.data(), Some("one"));
        assert_eq!(second.event_type(), Some("exception"));
        assert_eq!(second.data(), Some("two"));
    }

    #[test]
    fn test_round_trip_through_wire_format() {
        let original = Event::yield_data("aGVsbG8=");
        let wire = original.to_wire();
        let text = std::str::from_utf8(&wire).unwrap();

        let mut parser = EventParser::new();
        let mut parsed = None;
        for line in text.split_terminator('\n') {
            if let Some(event) = parser.feed_line(line) {
                parsed = Some(event);
            }
        }
        assert_eq!(parsed.unwrap(), original);
    }

    #[test]
    fn test_fields_other_than_event_and_data() {
        let mut parser = EventParser::new();
        parser.feed_line("id: 7");
        parser.feed_line("data: x");
        let event = parser.feed_line("").unwrap();
        assert_eq!(event.field("id"), Some("7"));
        assert_eq!(event.field(DATA_FIELD), Some("x"));
        assert_eq!(event.field(EVENT_FIELD), None);
    }
}
