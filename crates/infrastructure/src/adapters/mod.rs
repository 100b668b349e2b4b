//! Backend adapters

mod ollama_backend;

pub use ollama_backend::OllamaBackend;
