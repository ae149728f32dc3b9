//! Email discovery strategies: pattern generation, the verification sweep
//! over generated candidates, and the bounded research fallback.

pub(crate) mod finder;
pub(crate) mod patterns;
pub(crate) mod research;
