use tracing::debug;

use crate::error::MalformedEmail;
use crate::models::{Candidate, CategorizedCandidate, Category};

/// Only this enrollment batch is kept for branch breakdowns.
pub const RETAINED_BATCH: i32 = 21;

/// Batches older than this are left out of the batch distribution.
pub const EARLIEST_BATCH_YEAR: i32 = 2017;

/// Lateral-entry students carry this code and joined a year after their batch.
const LATERAL_ENTRY_CODE: &str = "pa5a";

/// First match wins.
const BRANCH_PREFIXES: [(&str, Category); 9] = [
    ("05", Category::Cse),
    ("54", Category::AiDs),
    ("04", Category::Ece),
    ("12", Category::It),
    ("01", Category::Civil),
    ("02", Category::Eee),
    ("03", Category::Me),
    ("61", Category::AiMl),
    ("57", Category::CsBs),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub year: Option<i32>,
    pub category: Category,
}

/// Never fails: malformed input yields `Category::Other` with no year.
pub fn classify(email: &str) -> Classification {
    match branch_code(email) {
        Ok(code) => Classification {
            year: extract_year(email),
            category: category_for_code(code),
        },
        Err(reason) => {
            debug!(email, %reason, "malformed candidate email");
            Classification {
                year: None,
                category: Category::Other,
            }
        }
    }
}

/// Two-digit batch prefix, e.g. `21` for `21a91a0501@...`. No range check.
pub fn extract_year(email: &str) -> Option<i32> {
    let prefix: String = email.chars().take(2).collect();
    prefix.parse::<i32>().ok()
}

/// Last four characters of the local part.
pub fn branch_code(email: &str) -> Result<&str, MalformedEmail> {
    let (local, _) = email.split_once('@').ok_or(MalformedEmail::MissingAt)?;
    let len = local.chars().count();
    if len < 4 {
        return Err(MalformedEmail::ShortLocalPart(len));
    }
    let start = local
        .char_indices()
        .nth(len - 4)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    Ok(&local[start..])
}

pub fn category_for_code(code: &str) -> Category {
    BRANCH_PREFIXES
        .iter()
        .find(|(prefix, _)| code.starts_with(prefix))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Other)
}

/// Classifies every candidate and keeps only the retained batch.
pub fn categorize(candidates: &[Candidate]) -> Vec<CategorizedCandidate> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let Classification { year, category } = classify(&candidate.email);
            (year == Some(RETAINED_BATCH)).then(|| CategorizedCandidate {
                candidate: candidate.clone(),
                category,
            })
        })
        .collect()
}

/// Full enrollment year for the batch distribution, or `None` when the email
/// has no numeric prefix or predates `EARLIEST_BATCH_YEAR`.
pub fn batch_year(email: &str) -> Option<i32> {
    let mut chars = email.chars();
    let tens = chars.next()?.to_digit(10)?;
    let units = chars.next()?.to_digit(10)?;
    let mut year = (tens * 10 + units) as i32;
    if email.contains(LATERAL_ENTRY_CODE) {
        year -= 1;
    }
    let full_year = 2000 + year;
    (full_year >= EARLIEST_BATCH_YEAR).then_some(full_year)
}
