//! Prompt window rendering
//!
//! The durable conversation log and the prompt fed to the model are separate
//! concerns: the log is append-only and authoritative, the window here is a
//! bounded rendering of its tail.

use chatflow_core::conversation::{ConversationContext, MessageRole};
use chatflow_core::llm_types::ChatMessage;

/// Render the tail of the durable log as chat messages
///
/// Tool entries (e.g. media deliveries) render as assistant messages so the
/// model knows what the customer already received.
pub fn render_window(conversation: &ConversationContext, max_entries: usize) -> Vec<ChatMessage> {
    conversation
        .recent(max_entries)
        .iter()
        .map(|entry| match entry.role {
            MessageRole::Customer => ChatMessage::user(entry.content.clone()),
            MessageRole::Assistant | MessageRole::HumanAgent | MessageRole::Tool => {
                ChatMessage::assistant(entry.content.clone())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::conversation::MessageEntry;
    use chatflow_core::llm_types::Role;
    use uuid::Uuid;

    #[test]
    fn test_window_is_bounded_and_ordered() {
        let mut conv = ConversationContext::new(Uuid::new_v4(), "t", "+1");
        for i in 0..20 {
            conv.push(MessageEntry::customer(format!("q{i}")));
            conv.push(MessageEntry::assistant(format!("a{i}")));
        }

        let window = render_window(&conv, 6);
        assert_eq!(window.len(), 6);
        assert_eq!(window[0].content, "a17");
        assert_eq!(window[5].content, "a19");
    }

    #[test]
    fn test_roles_map_to_chat_roles() {
        let mut conv = ConversationContext::new(Uuid::new_v4(), "t", "+1");
        conv.push(MessageEntry::customer("hola"));
        conv.push(MessageEntry::human_agent("buenas"));

        let window = render_window(&conv, 10);
        assert_eq!(window[0].role, Role::User);
        assert_eq!(window[1].role, Role::Assistant);
    }
}
