// Prompt templates for the text-generation actions.
// Article and blog-title prompts are written by the client and forwarded verbatim.

/// Shown to the model in place of resume text when extraction yields nothing.
pub const EMPTY_RESUME_PLACEHOLDER: &str = "No readable text found in this PDF.";

/// Stored as the creation prompt for resume reviews; the resume text itself is not persisted.
pub const RESUME_REVIEW_RECORD_PROMPT: &str = "Review the uploaded resume";

const RESUME_REVIEW_TEMPLATE: &str = "Review the following resume and provide constructive \
    feedback on its strengths, weaknesses, and areas for improvement. \
    Resume Content: \n\n{resume_text}";

pub fn resume_review_prompt(resume_text: &str) -> String {
    RESUME_REVIEW_TEMPLATE.replace("{resume_text}", resume_text)
}
