//! Prompt augmentation

use std::fmt::Write;

/// Fold retrieved documents into a context-enhanced prompt
///
/// Each document becomes a numbered `Document N:` block; the original
/// question follows the context so the model answers it against the
/// provided documents rather than from memory.
#[must_use]
pub fn build_augmented_prompt(query: &str, documents: &[String]) -> String {
    let mut context = String::new();
    for (i, doc) in documents.iter().enumerate() {
        if i > 0 {
            context.push_str("\n\n");
        }
        // Infallible on String
        let _ = write!(context, "Document {}: {doc}", i + 1);
    }

    format!(
        "Based on the following context documents, please answer the question.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {query}\n\
         \n\
         Please provide a comprehensive answer based on the context provided."
    )
}
