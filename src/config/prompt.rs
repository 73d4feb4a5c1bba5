use crate::error::TemplateError;
use crate::models::faq::Retrieval;

pub const CONTEXT_PLACEHOLDER: &str = "context";
pub const USER_MESSAGE_PLACEHOLDER: &str = "user_message";

pub const NO_CONTEXT_SENTINEL: &str = "No additional information is available.";

const CONTEXT_HEADER: &str = "--- FAQ ---";
const CONTEXT_FOOTER: &str = "--- END FAQ ---";

pub const DEFAULT_TEMPLATE: &str = "You are a friendly customer-service assistant for a small business.
Use the information below to answer the customer's question when it is relevant.
If the information does not cover the question, say so politely and answer as best you can.

Information:
{context}

Customer question: {user_message}

Answer:";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Context,
    UserMessage,
}

/// A parsed prompt template. `{context}` and `{user_message}` are the only
/// placeholders; `{{` and `}}` stand for literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let rest = &text[offset + 1..];
                    let end = rest.find('}').ok_or(TemplateError::Unbalanced(offset))?;
                    let name = &rest[..end];
                    if name.contains('{') {
                        return Err(TemplateError::Unbalanced(offset));
                    }

                    let segment = match name {
                        CONTEXT_PLACEHOLDER => Segment::Context,
                        USER_MESSAGE_PLACEHOLDER => Segment::UserMessage,
                        other => {
                            return Err(TemplateError::UnknownPlaceholder(other.to_string()));
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);

                    let closing = offset + 1 + end;
                    while chars.next_if(|(i, _)| *i <= closing).is_some() {}
                }
                '}' => {
                    return Err(TemplateError::Unbalanced(offset));
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.contains(&Segment::Context) {
            return Err(TemplateError::MissingPlaceholder(CONTEXT_PLACEHOLDER));
        }
        if !segments.contains(&Segment::UserMessage) {
            return Err(TemplateError::MissingPlaceholder(USER_MESSAGE_PLACEHOLDER));
        }

        Ok(Self { segments })
    }

    pub fn render(&self, context: &str, user_message: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Context => out.push_str(context),
                Segment::UserMessage => out.push_str(user_message),
            }
        }
        out
    }
}

pub fn render_context(retrieval: &Retrieval) -> String {
    let entries = retrieval.entries();
    if entries.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    let body = entries
        .iter()
        .map(|faq| format!("Question: {}\nAnswer: {}", faq.question, faq.answer))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{}\n{}\n{}", CONTEXT_HEADER, body, CONTEXT_FOOTER)
}

pub fn compose(
    template: &str,
    retrieval: &Retrieval,
    user_message: &str
) -> Result<String, TemplateError> {
    let template = PromptTemplate::parse(template)?;
    Ok(template.render(&render_context(retrieval), user_message))
}
