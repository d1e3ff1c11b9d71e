//! @-mentions: tokenizing message text and autocompleting while composing.

pub mod autocomplete;
pub mod tokenizer;

pub use autocomplete::{
    ComposerKey, Committed, KeyOutcome, MentionAutocomplete, MentionState, detect_trigger,
    filter_candidates,
};
pub use tokenizer::{MentionSegment, mention_markup, mentioned_names, tokenize};
