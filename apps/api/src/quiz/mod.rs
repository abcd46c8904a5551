// Quiz engine: LLM question generation, deterministic scoring, coaching
// feedback. Scoring is pure and fully unit-tested; only generation and
// feedback touch the LLM.

pub mod feedback;
pub mod generate;
pub mod handlers;
pub mod scoring;
