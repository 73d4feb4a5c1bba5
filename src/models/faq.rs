use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

/// Outcome of reading the FAQ table for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Retrieval {
    Rows(Vec<FaqEntry>),
    Unavailable(String),
}

impl Retrieval {
    pub fn entries(&self) -> &[FaqEntry] {
        match self {
            Retrieval::Rows(rows) => rows,
            Retrieval::Unavailable(_) => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Retrieval::Rows(_))
    }
}
