//! Short-circuit for trivial greetings so they never reach the completion provider.

/// Reply sent instead of querying the model when [`matches`] is true.
pub const GREETING_REPLY: &str = "Apa yang bisa saya bantu, kak?";

const GREETING_TOKENS: [&str; 6] = ["halo", "hai", "hi", "hello", "hey", "selamat"];

/// Messages at or above this many UTF-8 bytes are never treated as greetings.
const MAX_GREETING_BYTES: usize = 20;

/// True when the lower-cased text contains a greeting token and the untrimmed
/// text is shorter than 20 bytes.
///
/// Containment is substring-based, so short texts such as "this" match via "hi".
pub fn matches(text: &str) -> bool {
    if text.len() >= MAX_GREETING_BYTES {
        return false;
    }
    let lowered = text.to_lowercase();
    GREETING_TOKENS.iter().any(|token| lowered.contains(token))
}
