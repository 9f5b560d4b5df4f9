pub mod models;
pub mod prompts;
pub mod text;

pub use models::*;
pub use prompts::{example_questions, ExampleQuestions, PromptSet};
pub use text::normalize_text;
