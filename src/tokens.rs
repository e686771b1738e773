use crate::state::RequestState;

/// Flat cost attributed to each pipeline step for prompt scaffolding the
/// estimate cannot see.
const STEP_BASE_TOKENS: u32 = 50;

/// Floor for the final estimate; even a trivial request spends this much.
const MIN_USAGE_TOKENS: u32 = 100;

/// Conservative token estimate for a single piece of text.
fn estimate_text_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let char_count = text.chars().count();
    let word_count = text.split_whitespace().count();

    // ~4 chars per token, rounded up; take the larger of the two
    // approximations to stay conservative.
    let approx_from_chars = (char_count + 3) / 4;
    approx_from_chars.max(word_count) as u32
}

/// Estimate total token usage for one completed request. This is the single
/// accounting boundary: swap the implementation here to move to
/// provider-reported usage.
pub fn estimate_usage(state: &RequestState) -> u32 {
    let step_tokens = state.trace.len() as u32 * STEP_BASE_TOKENS;

    let mut content_tokens = estimate_text_tokens(&state.request_text);
    if let Some(answer) = &state.answer {
        content_tokens += estimate_text_tokens(answer);
    }
    for source in &state.sources {
        content_tokens += estimate_text_tokens(&source.content);
    }

    (step_tokens + content_tokens).max(MIN_USAGE_TOKENS)
}
