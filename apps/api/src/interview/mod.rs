// Voice interview: question generation, Whisper transcription, LLM
// evaluation. Transcription and evaluation both degrade gracefully; a
// submitted interview always completes.

pub mod handlers;
pub mod transcribe;
