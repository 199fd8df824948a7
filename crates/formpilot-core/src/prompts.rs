//! Prompt builders for the application-assist tasks.
//!
//! Pure functions from typed inputs to prompt strings — no I/O, no state.
//! Also hosts the keyword field matcher used as a cheap pre-LLM shortcut.

/// Ordered substring patterns per logical profile field. First hit wins, so
/// the more specific entries sit above the generic ones.
const FIELD_PATTERNS: &[(&str, &[&str])] = &[
    ("first_name", &["first name", "firstname", "given name", "forename"]),
    ("last_name", &["last name", "lastname", "surname", "family name"]),
    ("full_name", &["full name", "legal name", "your name"]),
    ("email", &["email", "e-mail"]),
    ("phone", &["phone", "mobile", "telephone", "cell"]),
    ("linkedin", &["linkedin"]),
    ("github", &["github"]),
    ("website", &["website", "portfolio", "personal site"]),
    ("address", &["address", "street"]),
    ("city", &["city", "town"]),
    ("state", &["state", "province"]),
    ("zip_code", &["zip", "postal"]),
    ("country", &["country"]),
    ("salary", &["salary", "compensation", "desired pay", "pay expectation"]),
    ("years_experience", &["years of experience", "years experience", "experience in years"]),
    ("notice_period", &["notice period", "earliest start", "available to start", "start date"]),
    ("cover_letter", &["cover letter", "why do you want", "why are you interested"]),
];

/// Match a form-field label to a logical profile key without touching the
/// LLM. Case-insensitive substring test against a fixed table; None when no
/// pattern applies.
pub fn match_field_pattern(label: &str) -> Option<&'static str> {
    let lower = label.to_lowercase();
    for (key, patterns) in FIELD_PATTERNS {
        if patterns.iter().any(|p| lower.contains(p)) {
            return Some(key);
        }
    }
    None
}

/// Ask the model to map a field label onto one of the profile keys
pub fn field_match_prompt(label: &str, profile_fields: &[&str]) -> String {
    format!(
        "You are matching job-application form fields to profile data.\n\
         Form field label: \"{label}\"\n\
         Available profile fields: {}\n\n\
         Reply with exactly one profile field name from the list, or the word \
         null if none of them fits. Reply with nothing else.",
        profile_fields.join(", ")
    )
}

/// Draft an answer to a free-text application question
pub fn form_response_prompt(question: &str, profile: &str, job: &str) -> String {
    format!(
        "You are helping a candidate fill in a job application.\n\n\
         Candidate profile:\n{profile}\n\n\
         Job context:\n{job}\n\n\
         Application question:\n{question}\n\n\
         Write a concise, first-person answer in the candidate's voice. \
         Do not invent facts that are not in the profile. Reply with the \
         answer text only."
    )
}

/// Condense a job description to its essentials
pub fn job_summary_prompt(description: &str) -> String {
    format!(
        "Summarize this job posting in 3-4 sentences covering the role, \
         key responsibilities, and must-have requirements:\n\n{description}"
    )
}

/// Pull the technology keywords out of a job description
pub fn tech_stack_prompt(description: &str) -> String {
    format!(
        "List the technologies, languages, and tools mentioned in this job \
         posting as a single comma-separated line, nothing else:\n\n{description}"
    )
}

/// Score how well a profile fits a job, 0-100
pub fn relevance_prompt(job: &str, profile: &str) -> String {
    format!(
        "Rate how well this candidate matches the job on a scale of 0 to 100.\n\n\
         Job posting:\n{job}\n\n\
         Candidate profile:\n{profile}\n\n\
         Reply with a single integer between 0 and 100 and nothing else."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_field_pattern_case_insensitive() {
        assert_eq!(match_field_pattern("FIRST NAME"), Some("first_name"));
        assert_eq!(match_field_pattern("Email Address"), Some("email"));
        assert_eq!(match_field_pattern("LinkedIn Profile URL"), Some("linkedin"));
    }

    #[test]
    fn test_match_field_pattern_misses() {
        assert_eq!(match_field_pattern("Random Field"), None);
        assert_eq!(match_field_pattern(""), None);
    }

    #[test]
    fn test_match_field_pattern_specific_before_generic() {
        // "first name" must not fall through to full_name's "your name"
        assert_eq!(match_field_pattern("Your first name"), Some("first_name"));
        assert_eq!(match_field_pattern("What is your name?"), Some("full_name"));
    }

    #[test]
    fn test_match_field_pattern_more_fields() {
        assert_eq!(match_field_pattern("Expected salary"), Some("salary"));
        assert_eq!(match_field_pattern("Phone number"), Some("phone"));
        assert_eq!(match_field_pattern("Years of experience"), Some("years_experience"));
        assert_eq!(match_field_pattern("Zip / Postal code"), Some("zip_code"));
    }

    #[test]
    fn test_field_match_prompt_contents() {
        let prompt = field_match_prompt("Desired Role", &["first_name", "email"]);
        assert!(prompt.contains("Desired Role"));
        assert!(prompt.contains("first_name, email"));
        assert!(prompt.contains("null"));
    }

    #[test]
    fn test_relevance_prompt_asks_for_integer() {
        let prompt = relevance_prompt("Rust engineer", "5 years of Rust");
        assert!(prompt.contains("0 to 100"));
        assert!(prompt.contains("Rust engineer"));
        assert!(prompt.contains("5 years of Rust"));
    }

    #[test]
    fn test_form_response_prompt_contains_sections() {
        let prompt = form_response_prompt("Why us?", "profile text", "job text");
        assert!(prompt.contains("Why us?"));
        assert!(prompt.contains("profile text"));
        assert!(prompt.contains("job text"));
    }

    #[test]
    fn test_tech_stack_prompt_requests_comma_list() {
        let prompt = tech_stack_prompt("We use Rust and Kafka");
        assert!(prompt.contains("comma-separated"));
        assert!(prompt.contains("We use Rust and Kafka"));
    }
}
