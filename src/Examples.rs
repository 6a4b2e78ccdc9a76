//! examples of usage of RustedUsadel
/// numbered material stacks solved end to end
pub mod usadel_examples;
