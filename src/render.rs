//! Renderer seam between the core and a concrete display surface.

use crate::conversation::{format_timestamp, Conversation};
use crate::format::format_message;

/// Host-implemented message sink. The core hands over formatted HTML and
/// display metadata; the host decides what to do with it.
pub trait Renderer {
    /// Append one rendered message. `html` is the formatter's output,
    /// `index` its position in the conversation, `timestamp` a
    /// display-ready time string (empty when timestamps are disabled).
    fn append_message(&mut self, html: &str, is_user: bool, index: usize, timestamp: &str);

    /// Remove all rendered messages.
    fn clear(&mut self);

    /// Show a transient status line.
    fn show_status(&mut self, text: &str);
}

/// Re-render a whole conversation through the formatter, as when switching
/// threads.
pub fn replay(renderer: &mut dyn Renderer, conv: &Conversation, show_timestamps: bool) {
    renderer.clear();
    for (index, msg) in conv.messages.iter().enumerate() {
        let timestamp = if show_timestamps {
            format_timestamp(msg.timestamp)
        } else {
            String::new()
        };
        renderer.append_message(&format_message(&msg.content), msg.is_user, index, &timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ChatMessage;

    #[derive(Default)]
    struct RecordingRenderer {
        cleared: usize,
        messages: Vec<(String, bool, usize)>,
    }

    impl Renderer for RecordingRenderer {
        fn append_message(&mut self, html: &str, is_user: bool, index: usize, _timestamp: &str) {
            self.messages.push((html.to_string(), is_user, index));
        }

        fn clear(&mut self) {
            self.cleared += 1;
            self.messages.clear();
        }

        fn show_status(&mut self, _text: &str) {}
    }

    #[test]
    fn test_replay_formats_each_message_in_order() {
        let mut conv = Conversation::new();
        conv.push_message(ChatMessage::user("**hi**"));
        conv.push_message(ChatMessage::bot("reply", None));

        let mut renderer = RecordingRenderer::default();
        replay(&mut renderer, &conv, true);

        assert_eq!(renderer.cleared, 1);
        assert_eq!(renderer.messages.len(), 2);
        assert_eq!(renderer.messages[0].0, "<strong>hi</strong>");
        assert!(renderer.messages[0].1);
        assert_eq!(renderer.messages[1], ("reply".to_string(), false, 1));
    }
}
