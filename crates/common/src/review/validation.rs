//! Required-field checks shared by every author-triggered transition

use serde::{Deserialize, Serialize};

use crate::config::SubmissionMode;
use crate::errors::{AppError, Result};

/// Author-supplied fields of a publication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionInput {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub keywords: Option<String>,
    /// Secondary authors in display order
    #[serde(default)]
    pub co_authors: Vec<String>,
}

/// Submission after validation, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub keywords: Option<String>,
    pub co_authors: Vec<CoAuthor>,
}

/// Secondary author with its 1-based display position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoAuthor {
    pub name: String,
    pub position: i32,
}

/// Position of the first secondary author; the primary author holds 1.
pub const FIRST_CO_AUTHOR_POSITION: i32 = 2;

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Check the required fields for `mode` and normalise the input.
///
/// `has_file` tells whether a PDF is (or will be) attached to the
/// publication.
pub fn validate_submission(
    input: &SubmissionInput,
    has_file: bool,
    mode: SubmissionMode,
) -> Result<ValidSubmission> {
    require("title", &input.title)?;
    require("summary", &input.summary)?;

    let has_content = !input.content.trim().is_empty();
    match mode {
        SubmissionMode::RichText if !has_content => {
            return Err(AppError::MissingField {
                field: "content".to_string(),
            });
        }
        SubmissionMode::Pdf if !has_file => {
            return Err(AppError::MissingField {
                field: "file".to_string(),
            });
        }
        SubmissionMode::Either if !has_content && !has_file => {
            return Err(AppError::Validation {
                message: "Either content or an attached file is required".to_string(),
                field: Some("content".to_string()),
            });
        }
        _ => {}
    }

    let keywords = input
        .keywords
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from);

    Ok(ValidSubmission {
        title: input.title.trim().to_string(),
        summary: input.summary.trim().to_string(),
        content: input.content.clone(),
        keywords,
        co_authors: number_co_authors(&input.co_authors),
    })
}

/// Drop blank names and assign positions in input order.
pub fn number_co_authors(names: &[String]) -> Vec<CoAuthor> {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .zip(FIRST_CO_AUTHOR_POSITION..)
        .map(|(name, position)| CoAuthor {
            name: name.to_string(),
            position,
        })
        .collect()
}

/// Profile fields a user may change about themselves
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileInput {
    pub full_name: String,
    pub display_name: String,
    pub institution: String,
}

/// Trim and require every profile field.
pub fn validate_profile(input: &ProfileInput) -> Result<ProfileInput> {
    require("full_name", &input.full_name)?;
    require("display_name", &input.display_name)?;
    require("institution", &input.institution)?;
    Ok(ProfileInput {
        full_name: input.full_name.trim().to_string(),
        display_name: input.display_name.trim().to_string(),
        institution: input.institution.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, summary: &str, content: &str) -> SubmissionInput {
        SubmissionInput {
            title: title.to_string(),
            summary: summary.to_string(),
            content: content.to_string(),
            ..Default::default()
        }
    }

    fn missing_field(result: Result<ValidSubmission>) -> Option<String> {
        match result {
            Err(AppError::MissingField { field }) => Some(field),
            Err(AppError::Validation { field, .. }) => field,
            _ => None,
        }
    }

    #[test]
    fn test_title_and_summary_required_after_trim() {
        for mode in [SubmissionMode::RichText, SubmissionMode::Pdf, SubmissionMode::Either] {
            let r = validate_submission(&input("  ", "summary", "body"), true, mode);
            assert_eq!(missing_field(r).as_deref(), Some("title"));
            let r = validate_submission(&input("Title", "\n", "body"), true, mode);
            assert_eq!(missing_field(r).as_deref(), Some("summary"));
        }
    }

    #[test]
    fn test_rich_text_mode_requires_content() {
        let r = validate_submission(&input("T", "S", "   "), true, SubmissionMode::RichText);
        assert_eq!(missing_field(r).as_deref(), Some("content"));
        assert!(validate_submission(&input("T", "S", "<p>x</p>"), false, SubmissionMode::RichText).is_ok());
    }

    #[test]
    fn test_pdf_mode_requires_file() {
        let r = validate_submission(&input("T", "S", "body"), false, SubmissionMode::Pdf);
        assert_eq!(missing_field(r).as_deref(), Some("file"));
        assert!(validate_submission(&input("T", "S", ""), true, SubmissionMode::Pdf).is_ok());
    }

    #[test]
    fn test_either_mode() {
        assert!(validate_submission(&input("T", "S", ""), false, SubmissionMode::Either).is_err());
        assert!(validate_submission(&input("T", "S", ""), true, SubmissionMode::Either).is_ok());
        assert!(validate_submission(&input("T", "S", "body"), false, SubmissionMode::Either).is_ok());
    }

    #[test]
    fn test_normalisation() {
        let raw = SubmissionInput {
            title: "  Deep Sea Vents ".to_string(),
            summary: " A survey ".to_string(),
            content: "<p>body</p>\n".to_string(),
            keywords: Some("   ".to_string()),
            co_authors: vec![" Ada ".to_string(), "".to_string(), "Grace".to_string()],
        };
        let valid = validate_submission(&raw, false, SubmissionMode::Either).unwrap();
        assert_eq!(valid.title, "Deep Sea Vents");
        assert_eq!(valid.summary, "A survey");
        assert_eq!(valid.content, "<p>body</p>\n");
        assert_eq!(valid.keywords, None);
        assert_eq!(
            valid.co_authors,
            vec![
                CoAuthor { name: "Ada".to_string(), position: 2 },
                CoAuthor { name: "Grace".to_string(), position: 3 },
            ]
        );
    }

    #[test]
    fn test_profile_validation() {
        let ok = validate_profile(&ProfileInput {
            full_name: " Ada Lovelace ".to_string(),
            display_name: "Ada".to_string(),
            institution: "Analytical Society".to_string(),
        })
        .unwrap();
        assert_eq!(ok.full_name, "Ada Lovelace");

        let err = validate_profile(&ProfileInput {
            full_name: "Ada".to_string(),
            display_name: "Ada".to_string(),
            institution: " ".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, AppError::MissingField { field } if field == "institution"));
    }
}
