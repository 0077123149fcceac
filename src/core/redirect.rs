//! Canned replies for off-topic messages.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Built-in redirect pool
pub const DEFAULT_REDIRECTS: &[&str] = &[
    "I'm here to support your **mental health and emotional well-being**. Is there something on your mind you'd like to talk about?",
    "That's a little outside what I can help with. I'm best at conversations about *how you're feeling*, stress, or self-care. How are you doing today?",
    "I focus on **emotional support and wellness**. If anything is weighing on you, I'm happy to listen.",
    "I may not be the right companion for that topic, but I'm always here if you want to talk about your mood, relationships, or anything that's been stressing you out.",
    "Let's bring it back to you. How have you been feeling lately? I'm here to help with **stress, anxiety, motivation**, and more.",
];

/// Index of the last redirect shown in a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectState(Option<usize>);

impl RedirectState {
    pub fn last_index(&self) -> Option<usize> {
        self.0
    }
}

/// Picks redirect messages without showing the same one twice in a row
#[derive(Debug, Clone)]
pub struct RedirectSelector {
    messages: Vec<String>,
}

impl Default for RedirectSelector {
    fn default() -> Self {
        Self {
            messages: DEFAULT_REDIRECTS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl RedirectSelector {
    /// Use a custom pool, falling back to the built-in one when empty.
    pub fn new(messages: Vec<String>) -> Self {
        if messages.is_empty() {
            return Self::default();
        }
        Self { messages }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Choose the next message and the state to carry forward.
    pub fn next<R: Rng + ?Sized>(&self, last: RedirectState, rng: &mut R) -> (&str, RedirectState) {
        let len = self.messages.len();
        let mut index = rng.gen_range(0..len);
        if len > 1 {
            while Some(index) == last.0 {
                index = rng.gen_range(0..len);
            }
        }
        (&self.messages[index], RedirectState(Some(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_never_repeats_back_to_back() {
        let selector = RedirectSelector::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = RedirectState::default();

        for _ in 0..500 {
            let (_, next) = selector.next(state, &mut rng);
            assert_ne!(next, state);
            state = next;
        }
    }

    #[test]
    fn test_two_messages_alternate() {
        let selector = RedirectSelector::new(vec!["a".into(), "b".into()]);
        let mut rng = StdRng::seed_from_u64(42);
        let (first, mut state) = selector.next(RedirectState::default(), &mut rng);
        let mut previous = first.to_string();

        for _ in 0..20 {
            let (message, next) = selector.next(state, &mut rng);
            assert_ne!(message, previous);
            previous = message.to_string();
            state = next;
        }
    }

    #[test]
    fn test_single_message_repeats() {
        let selector = RedirectSelector::new(vec!["only".into()]);
        let mut rng = StdRng::seed_from_u64(1);
        let (_, state) = selector.next(RedirectState::default(), &mut rng);
        let (message, next) = selector.next(state, &mut rng);
        assert_eq!(message, "only");
        assert_eq!(next.last_index(), Some(0));
    }

    #[test]
    fn test_empty_pool_uses_builtin() {
        let selector = RedirectSelector::new(vec![]);
        assert_eq!(selector.len(), DEFAULT_REDIRECTS.len());
    }
}
