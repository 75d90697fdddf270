//! Prompt templates and placeholder rendering.
//!
//! Templates use `{name}` placeholders. A doubled brace (`{{` or `}}`)
//! renders as a literal brace, which lets the quiz template show the model
//! the exact JSON shape it must return.

use anyhow::{bail, Result};
use std::collections::HashMap;

pub const CHAT_TEMPLATE: &str = "
You are a helpful study assistant. Based on the following context from a textbook, answer the user's question.
Your answer MUST be grounded in the provided context.
Cite your answer by quoting a relevant 2-3 line snippet from the source context. Format the citation like this: \"According to the text: '[snippet]'\".

Context:
---
{context}
---

Question:
{question}
";

pub const QUIZ_TEMPLATE: &str = r#"
You are an expert at creating educational quizzes for students.
Given the following content from a textbook, generate a quiz with 3 Multiple Choice Questions (MCQs), 1 Short Answer Question (SAQ), and 1 Long Answer Question (LAQ).

The output MUST be a single, valid JSON object. Do not include any text or markdown formatting before or after the JSON.

The JSON object should follow this exact structure:
{{
  "mcqs": [
    {{
      "question": "The question text here.",
      "topic": "A one or two-word topic for this question (e.g., 'Kinematics', 'Newton's Laws').",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "answer": "The correct option text.",
      "explanation": "A brief explanation of why this is the correct answer."
    }}
  ],
  "saqs": [
    {{
      "question": "The short answer question here.",
      "topic": "A one or two-word topic for this question (e.g., 'Kinematics', 'Newton's Laws').",
      "answer": "A concise, correct answer.",
      "explanation": "A brief explanation of the concept."
    }}
  ],
  "laqs": [
    {{
      "question": "The long answer question here.",
      "topic": "A one or two-word topic for this question (e.g., 'Kinematics', 'Newton's Laws').",
      "answer": "A comprehensive, correct answer.",
      "explanation": "A detailed explanation of the topic."
    }}
  ]
}}

Here is the textbook content:
---
{content}
---
"#;

/// Fill `{name}` placeholders from `vars`.
///
/// Unknown or unterminated placeholders are errors so a typo in a template
/// fails loudly instead of leaking braces to the model. Substituted values
/// are inserted verbatim and never re-scanned.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => bail!("unterminated placeholder in template: {{{}", name),
                    }
                }
                match vars.get(name.trim()) {
                    Some(value) => out.push_str(value),
                    None => bail!("missing template variable: {}", name),
                }
            }
            '}' => bail!("unmatched '}}' in template"),
            _ => out.push(c),
        }
    }

    Ok(out)
}

pub fn chat_prompt(context: &str, question: &str) -> Result<String> {
    let vars = HashMap::from([("context", context), ("question", question)]);
    render(CHAT_TEMPLATE, &vars)
}

pub fn quiz_prompt(content: &str) -> Result<String> {
    let vars = HashMap::from([("content", content)]);
    render(QUIZ_TEMPLATE, &vars)
}
