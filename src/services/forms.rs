//! HTML forms
//!
//! Each form deserializes from a urlencoded body, runs its `validator`
//! field rules, then its clean steps. `clean()` returns either the cleaned
//! values or a `FormErrors` keyed by field name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationErrors};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const REQUIRED: &str = "This field is required.";

const BANNED_WORDS: &[&str] = &["spam", "abuse", "inappropriate"];
const BANNED_EMAIL_DOMAINS: &[&str] = &["tempmail.com", "throwaway.email"];

/// Remove anything that looks like an HTML tag
pub fn strip_tags(value: &str) -> String {
    TAG_RE.replace_all(value, "").into_owned()
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value, " ").trim().to_string()
}

/// Validation errors of one form submission
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Messages for one field, empty if it passed
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All messages, field errors first
    pub fn messages(&self) -> Vec<String> {
        self.fields
            .values()
            .flatten()
            .chain(self.non_field.iter())
            .cloned()
            .collect()
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = FormErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", error.code));
                form_errors.add(&field, message);
            }
        }
        form_errors
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.messages().join(" "))
    }
}

fn field_rules(form: &impl Validate) -> FormErrors {
    match form.validate() {
        Ok(()) => FormErrors::new(),
        Err(errors) => errors.into(),
    }
}

// ============================================================================
// Log message form
// ============================================================================

/// Form behind `/log/`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LogMessageForm {
    #[serde(default)]
    #[validate(length(
        max = 300,
        message = "Ensure this value has at most 300 characters."
    ))]
    pub message: String,
}

impl LogMessageForm {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message as it will be stored
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = field_rules(self);
        if errors.has_field("message") {
            return Err(errors);
        }

        match clean_message(&self.message) {
            Ok(message) => Ok(message),
            Err(message) => {
                errors.add("message", message);
                Err(errors)
            }
        }
    }
}

fn clean_message(raw: &str) -> Result<String, &'static str> {
    if raw.trim().is_empty() {
        return Err("Message cannot be empty.");
    }

    let message = collapse_whitespace(&strip_tags(raw));

    if message.chars().count() < 5 {
        return Err("Message must be at least 5 characters long.");
    }

    let lowered = message.to_lowercase();
    if BANNED_WORDS.iter().any(|word| lowered.contains(word)) {
        return Err("Message contains inappropriate content.");
    }

    Ok(message)
}

// ============================================================================
// Search form
// ============================================================================

/// Form behind `/search/`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SearchForm {
    #[serde(default, alias = "q")]
    #[validate(length(
        max = 100,
        message = "Ensure this value has at most 100 characters."
    ))]
    pub query: String,
}

impl SearchForm {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    /// Returns the query with tags stripped and whitespace trimmed
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = field_rules(self);
        if errors.has_field("query") {
            return Err(errors);
        }

        if self.query.trim().is_empty() {
            errors.add("query", "Search query cannot be empty.");
            return Err(errors);
        }

        let query = strip_tags(&self.query).trim().to_string();
        if query.chars().count() < 2 {
            errors.add("query", "Search query must be at least 2 characters long.");
            return Err(errors);
        }

        Ok(query)
    }
}

// ============================================================================
// Contact form
// ============================================================================

/// Subjects offered by the contact form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactSubject {
    General,
    Support,
    Feedback,
    Bug,
}

impl ContactSubject {
    pub const ALL: [ContactSubject; 4] = [
        ContactSubject::General,
        ContactSubject::Support,
        ContactSubject::Feedback,
        ContactSubject::Bug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactSubject::General => "general",
            ContactSubject::Support => "support",
            ContactSubject::Feedback => "feedback",
            ContactSubject::Bug => "bug",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContactSubject::General => "General Inquiry",
            ContactSubject::Support => "Technical Support",
            ContactSubject::Feedback => "Feedback",
            ContactSubject::Bug => "Bug Report",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == code)
    }

    /// Only these subjects may be flagged urgent
    pub fn allows_urgent(&self) -> bool {
        matches!(self, ContactSubject::Support | ContactSubject::Bug)
    }
}

/// Form behind `/contact/`
///
/// `urgent` holds the raw checkbox value; an unchecked box is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ContactForm {
    #[serde(default)]
    #[validate(length(
        max = 100,
        message = "Ensure this value has at most 100 characters."
    ))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub urgent: Option<String>,
}

/// Cleaned contact submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: ContactSubject,
    pub message: String,
    pub urgent: bool,
}

impl ContactForm {
    pub fn is_urgent(&self) -> bool {
        match self.urgent.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(value) => !matches!(value.to_lowercase().as_str(), "false" | "0"),
        }
    }

    pub fn clean(&self) -> Result<ContactMessage, FormErrors> {
        let mut errors = FormErrors::new();
        let rule_errors = field_rules(self);

        let name = self.name.trim().to_string();
        if name.is_empty() {
            errors.add("name", REQUIRED);
        } else {
            for message in rule_errors.field("name") {
                errors.add("name", message.clone());
            }
        }

        let email = self.email.trim().to_string();
        if email.is_empty() {
            errors.add("email", REQUIRED);
        } else if rule_errors.has_field("email") {
            for message in rule_errors.field("email") {
                errors.add("email", message.clone());
            }
        } else if let Some(message) = clean_email_domain(&email) {
            errors.add("email", message);
        }

        let subject = if self.subject.trim().is_empty() {
            errors.add("subject", REQUIRED);
            None
        } else {
            let subject = ContactSubject::from_code(self.subject.trim());
            if subject.is_none() {
                errors.add(
                    "subject",
                    format!(
                        "Select a valid choice. {} is not one of the available choices.",
                        self.subject.trim()
                    ),
                );
            }
            subject
        };

        let message = self.message.trim().to_string();
        if message.is_empty() {
            errors.add("message", REQUIRED);
        }

        let urgent = self.is_urgent();

        // Cross-field rule only runs when the subject itself is valid
        if let Some(subject) = subject {
            if urgent && !subject.allows_urgent() {
                errors.add_non_field("Urgent flag can only be used for support or bug reports.");
            }
        }

        match subject {
            Some(subject) => errors.into_result(ContactMessage {
                name,
                email,
                subject,
                message,
                urgent,
            }),
            None => Err(errors),
        }
    }
}

fn clean_email_domain(email: &str) -> Option<&'static str> {
    let domain = email.rsplit_once('@').map(|(_, domain)| domain.to_lowercase())?;
    if BANNED_EMAIL_DOMAINS.contains(&domain.as_str()) {
        Some("Please use a valid email address.")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn contact(subject: &str, urgent: Option<&str>) -> ContactForm {
        ContactForm {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            subject: subject.to_string(),
            message: "The engine stopped.".to_string(),
            urgent: urgent.map(str::to_string),
        }
    }

    // ========================================================================
    // LogMessageForm
    // ========================================================================

    #[test]
    fn test_log_message_cleans_html_and_whitespace() {
        let form = LogMessageForm::new("  <b>Hello</b>\n\n   <i>world</i>  ");
        assert_eq!(form.clean().unwrap(), "Hello world");
    }

    #[test]
    fn test_log_message_empty() {
        let errors = LogMessageForm::new("   ").clean().unwrap_err();
        assert_eq!(errors.field("message"), ["Message cannot be empty."]);
    }

    #[test]
    fn test_log_message_too_short_after_stripping() {
        let errors = LogMessageForm::new("<p>hey</p>").clean().unwrap_err();
        assert_eq!(
            errors.field("message"),
            ["Message must be at least 5 characters long."]
        );
    }

    #[test]
    fn test_log_message_banned_words_any_case() {
        for text in ["This is SPAM mail", "no Abuse please", "quite inappropriate"] {
            let errors = LogMessageForm::new(text).clean().unwrap_err();
            assert_eq!(
                errors.field("message"),
                ["Message contains inappropriate content."]
            );
        }
    }

    #[test]
    fn test_log_message_too_long() {
        let errors = LogMessageForm::new("a".repeat(301)).clean().unwrap_err();
        assert_eq!(
            errors.field("message"),
            ["Ensure this value has at most 300 characters."]
        );
        assert!(LogMessageForm::new("a".repeat(300)).clean().is_ok());
    }

    // ========================================================================
    // SearchForm
    // ========================================================================

    #[test]
    fn test_search_form() {
        assert_eq!(SearchForm::new("  <em>django</em> ").clean().unwrap(), "django");

        let errors = SearchForm::new("").clean().unwrap_err();
        assert_eq!(errors.field("query"), ["Search query cannot be empty."]);

        let errors = SearchForm::new("<b>x</b>").clean().unwrap_err();
        assert_eq!(
            errors.field("query"),
            ["Search query must be at least 2 characters long."]
        );

        assert!(SearchForm::new("q".repeat(101)).clean().is_err());
    }

    // ========================================================================
    // ContactForm
    // ========================================================================

    #[test]
    fn test_contact_valid() {
        let cleaned = contact("support", Some("on")).clean().unwrap();
        assert_eq!(cleaned.subject, ContactSubject::Support);
        assert!(cleaned.urgent);
        assert_eq!(cleaned.subject.label(), "Technical Support");
    }

    #[test]
    fn test_contact_urgent_requires_support_or_bug() {
        let errors = contact("general", Some("on")).clean().unwrap_err();
        assert!(errors.fields.is_empty());
        assert_eq!(
            errors.non_field,
            ["Urgent flag can only be used for support or bug reports."]
        );

        assert!(contact("bug", Some("true")).clean().is_ok());
        assert!(contact("feedback", None).clean().is_ok());
        assert!(contact("feedback", Some("false")).clean().is_ok());
        assert!(contact("feedback", Some("0")).clean().is_ok());
    }

    #[test]
    fn test_contact_banned_domain() {
        let mut form = contact("general", None);
        form.email = "someone@TempMail.com".to_string();
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.field("email"), ["Please use a valid email address."]);
    }

    #[test]
    fn test_contact_invalid_email_and_subject() {
        let mut form = contact("sales", None);
        form.email = "not-an-email".to_string();
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.field("email"), ["Enter a valid email address."]);
        assert!(errors.field("subject")[0].contains("sales"));
    }

    #[test]
    fn test_contact_required_fields() {
        let errors = ContactForm::default().clean().unwrap_err();
        for field in ["name", "email", "subject", "message"] {
            assert_eq!(errors.field(field), [REQUIRED], "field {}", field);
        }
    }

    #[test]
    fn test_form_errors_messages_order() {
        let mut errors = FormErrors::new();
        errors.add_non_field("overall");
        errors.add("b", "second");
        errors.add("a", "first");
        assert_eq!(errors.messages(), vec!["first", "second", "overall"]);
        assert_eq!(errors.to_string(), "first second overall");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_cleaned_message_has_no_tags_or_runs(raw in "[a-z <>/\\t\\n]{0,120}") {
            if let Ok(message) = LogMessageForm::new(raw).clean() {
                prop_assert!(!message.contains("  "));
                prop_assert_eq!(message.trim(), message.as_str());
                prop_assert!(message.chars().count() >= 5);
                prop_assert!(!TAG_RE.is_match(&message));
            }
        }
    }
}
