pub mod chat;
pub mod faq;
