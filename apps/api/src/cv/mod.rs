// CV intake: PDF text extraction, language detection, LLM field extraction
// with a regex fallback, best-effort IP geolocation.

pub mod extract;
pub mod geo;
pub mod handlers;
