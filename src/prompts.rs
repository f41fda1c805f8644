//! Prompts for the LLM-backed simplifier.
//!
//! The three steps mirror the remote backend: convert the page into Easy Read
//! sentences, have a second pass check them against the Easy Read rules, and
//! revise only if the check found problems. Callers can override the convert
//! prompt via [`crate::pipeline::llm::LlmSimplifierConfig::system_prompt`].

/// System prompt for the conversion step.
pub const CONVERT_SYSTEM_PROMPT: &str = r#"You rewrite documents in Easy Read format for people with learning disabilities.

Follow these rules precisely:

1. SENTENCES
   - One idea per sentence, at most 15 words
   - Use short, common words; explain any word that must stay hard
   - Use active voice and speak to the reader as "you"
   - Write numbers as digits

2. CONTENT
   - Keep every fact the reader needs; drop decoration and repetition
   - Keep the order of the original page
   - Never invent facts that are not on the page

3. IMAGES
   - Give every sentence an image_retrieval value: 1–4 plain words naming
     a concrete picture that shows the sentence (e.g. "doctor appointment")

4. TITLE
   - If the page has a clear document title, return it simplified as "title"
   - Otherwise omit "title"

5. OUTPUT FORMAT
   - Output ONLY a JSON object, no commentary, no markdown fences:
     {"title": "...", "easy_read_sentences": [{"sentence": "...", "image_retrieval": "..."}]}
   - If the page has no meaningful content, return {"easy_read_sentences": []}"#;

/// System prompt for the validation step.
pub const VALIDATE_SYSTEM_PROMPT: &str = r#"You check Easy Read sentences against the Easy Read rules:
one idea per sentence, at most 15 words, common words, active voice,
digits for numbers, and a concrete image_retrieval for every sentence.
Also check that no fact from the original page was lost or invented.

Output ONLY a JSON object:
{"valid": true|false, "issues": ["short description of each problem"]}"#;

/// System prompt for the revision step.
pub const REVISE_SYSTEM_PROMPT: &str = r#"You fix Easy Read sentences. You receive the original page,
the current sentences as JSON, and a list of problems found by a reviewer.
Fix every problem while keeping everything else unchanged.

Output ONLY the corrected JSON object in the same shape:
{"title": "...", "easy_read_sentences": [{"sentence": "...", "image_retrieval": "..."}]}"#;

/// User message for the conversion step.
pub fn convert_message(page_text: &str, image_set_ids: &[String]) -> String {
    let mut msg = format!("Original page:\n\"\"\"\n{}\n\"\"\"", page_text);
    if !image_set_ids.is_empty() {
        msg.push_str(&format!(
            "\n\nPrefer image_retrieval values that fit these image sets: {}.",
            image_set_ids.join(", ")
        ));
    }
    msg
}

/// User message for the validation step.
pub fn validate_message(page_text: &str, sentences_json: &str) -> String {
    format!(
        "Original page:\n\"\"\"\n{}\n\"\"\"\n\nEasy Read version:\n{}",
        page_text, sentences_json
    )
}

/// User message for the revision step.
pub fn revise_message(page_text: &str, sentences_json: &str, issues: &[String]) -> String {
    let issues = issues
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Original page:\n\"\"\"\n{}\n\"\"\"\n\nCurrent version:\n{}\n\nProblems:\n{}",
        page_text, sentences_json, issues
    )
}
