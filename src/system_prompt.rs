//! System prompt construction
//!
//! The assistant receives the same system string on both transports: the
//! CampusAI persona plus whatever student context is configured. Lines are
//! only added for context that is actually present.

use std::fmt::Write;

/// Base prompt establishing the assistant's role.
const BASE_PROMPT: &str = "You are CampusAI, the Campus Connect assistant. \
You help students with campus resources, organizations, events, \
scholarships, and academic information. Keep answers short, friendly, and \
specific to the student's situation.";

/// Student and campus context folded into the prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub campus: Option<String>,
    pub student_name: Option<String>,
    pub major: Option<String>,
    pub interests: Vec<String>,
}

/// Build the system string sent with every turn.
pub fn build_system_prompt(context: &PromptContext) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    let mut facts = Vec::new();
    if let Some(campus) = &context.campus {
        facts.push(format!("Campus: {campus}"));
    }
    if let Some(name) = &context.student_name {
        facts.push(format!("Student: {name}"));
    }
    if let Some(major) = &context.major {
        facts.push(format!("Major: {major}"));
    }
    if !context.interests.is_empty() {
        facts.push(format!("Interests: {}", context.interests.join(", ")));
    }

    if !facts.is_empty() {
        prompt.push_str("\n\nAbout this student:");
        for fact in facts {
            let _ = write!(prompt, "\n- {fact}");
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_context_yields_base_prompt_only() {
        let prompt = build_system_prompt(&PromptContext::default());
        assert_eq!(prompt, BASE_PROMPT);
        assert!(!prompt.contains("About this student"));
    }

    #[test]
    fn context_lines_appear_when_present() {
        let context = PromptContext {
            campus: Some("Bayview State".to_string()),
            student_name: Some("Jordan".to_string()),
            major: Some("Computer Science".to_string()),
            interests: vec!["robotics".to_string(), "chess".to_string()],
        };
        let prompt = build_system_prompt(&context);

        assert!(prompt.starts_with(BASE_PROMPT));
        assert!(prompt.contains("- Campus: Bayview State"));
        assert!(prompt.contains("- Student: Jordan"));
        assert!(prompt.contains("- Major: Computer Science"));
        assert!(prompt.contains("- Interests: robotics, chess"));
    }

    #[test]
    fn partial_context_omits_missing_lines() {
        let context = PromptContext {
            major: Some("Biology".to_string()),
            ..PromptContext::default()
        };
        let prompt = build_system_prompt(&context);

        assert!(prompt.contains("- Major: Biology"));
        assert!(!prompt.contains("Student:"));
        assert!(!prompt.contains("Interests:"));
    }
}
