//! Tour script: the welcome text, fallback text, and the ordered rule table.
//!
//! The script is plain YAML (`config/script.yaml` is compiled in as the default)
//! and is loaded once at startup. Every outgoing message lives here, not in code.

use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::dialogue::Stage;
use crate::message::MessageDescriptor;

/// Default script shipped with the binary.
pub const BUNDLED_SCRIPT: &str = include_str!("../config/script.yaml");

/// LINE accepts at most five messages per reply.
pub const MAX_REPLY_MESSAGES: usize = 5;

/// LINE buttons templates allow at most four actions.
pub const MAX_BUTTON_OPTIONS: usize = 4;

const DISPLAY_NAME_PLACEHOLDER: &str = "{display_name}";

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("reading script from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing script: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid script: {0}")]
    Invalid(String),
}

/// Root of a script file. Unknown top-level keys are allowed so scripts can keep YAML anchors in a side section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Reply to a follow event. `{display_name}` is replaced with the user's LINE display name.
    pub welcome: String,
    /// Reply when no rule matches.
    pub fallback: String,
    /// Rules in priority order.
    pub rules: Vec<Rule>,
}

/// One edge of the dialogue: accepted literals, where it is legal, where it leads, what it sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Rule {
    pub id: String,
    /// Literal inputs this rule accepts.
    #[serde(rename = "match")]
    pub match_text: Vec<String>,
    /// Compare lower-cased input. Literals must then be written in lower case.
    #[serde(default)]
    pub case_insensitive: bool,
    /// Stages where the rule is legal. Empty means every stage.
    #[serde(default)]
    pub from: Vec<Stage>,
    pub next: Stage,
    pub responses: Vec<MessageDescriptor>,
}

impl Rule {
    pub fn legal_at(&self, stage: Stage) -> bool {
        self.from.is_empty() || self.from.contains(&stage)
    }

    /// Input as this rule compares it.
    pub fn normalize<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if self.case_insensitive {
            Cow::Owned(input.to_lowercase())
        } else {
            Cow::Borrowed(input)
        }
    }

    pub fn matches(&self, input: &str) -> bool {
        let input = self.normalize(input);
        self.match_text.iter().any(|m| m == input.as_ref())
    }
}

impl Script {
    /// Parse the compiled-in default script.
    pub fn bundled() -> Result<Self, ScriptError> {
        Self::from_yaml(BUNDLED_SCRIPT)
    }

    pub fn from_yaml(s: &str) -> Result<Self, ScriptError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Read and parse a script file. Does not validate.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let s = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&s)
    }

    /// Welcome text with the display name filled in.
    pub fn welcome_for(&self, display_name: &str) -> String {
        self.welcome.replace(DISPLAY_NAME_PLACEHOLDER, display_name)
    }

    /// Check structural limits and that every button leads somewhere.
    ///
    /// A button option is dangling unless some rule legal at the stage the
    /// prompting rule leads to accepts the option's reply text.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.fallback.trim().is_empty() {
            return Err(ScriptError::Invalid("fallback text is empty".to_string()));
        }
        let mut ids = HashSet::new();
        for rule in &self.rules {
            if !ids.insert(rule.id.as_str()) {
                return Err(invalid(rule, "duplicate rule id"));
            }
            if rule.match_text.is_empty() {
                return Err(invalid(rule, "no match literals"));
            }
            for m in &rule.match_text {
                if m.is_empty() || m.trim() != m.as_str() {
                    return Err(invalid(rule, &format!("match literal {:?} is not trimmed", m)));
                }
                if rule.case_insensitive && m.to_lowercase() != *m {
                    return Err(invalid(
                        rule,
                        &format!("case-insensitive literal {:?} must be lower case", m),
                    ));
                }
            }
            if rule.responses.is_empty() {
                return Err(invalid(rule, "no responses"));
            }
            if rule.responses.len() > MAX_REPLY_MESSAGES {
                return Err(invalid(
                    rule,
                    &format!(
                        "{} responses exceeds the reply limit of {}",
                        rule.responses.len(),
                        MAX_REPLY_MESSAGES
                    ),
                ));
            }
            for msg in &rule.responses {
                self.validate_prompt(rule, msg)?;
            }
        }
        Ok(())
    }

    fn validate_prompt(&self, rule: &Rule, msg: &MessageDescriptor) -> Result<(), ScriptError> {
        let MessageDescriptor::ButtonPrompt { options, .. } = msg else {
            return Ok(());
        };
        if options.is_empty() || options.len() > MAX_BUTTON_OPTIONS {
            return Err(invalid(
                rule,
                &format!("button prompt has {} options (1..={})", options.len(), MAX_BUTTON_OPTIONS),
            ));
        }
        for option in options {
            let reachable = self
                .rules
                .iter()
                .any(|r| r.legal_at(rule.next) && r.matches(&option.text));
            if !reachable {
                return Err(invalid(
                    rule,
                    &format!(
                        "button {:?} sends {:?}, which no rule accepts at {}",
                        option.label, option.text, rule.next
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(rule: &Rule, what: &str) -> ScriptError {
    ScriptError::Invalid(format!("rule {}: {}", rule.id, what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_script_parses_and_validates() {
        let script = Script::bundled().unwrap();
        script.validate().unwrap();
        assert_eq!(script.rules.len(), 12);
        assert_eq!(script.rules[0].id, "gogo");
        assert!(script.rules[0].case_insensitive);
        assert!(script.rules.iter().skip(1).all(|r| !r.case_insensitive));
    }

    #[test]
    fn bundled_rules_respect_reply_limit() {
        let script = Script::bundled().unwrap();
        let max = script.rules.iter().map(|r| r.responses.len()).max();
        assert_eq!(max, Some(4));
    }

    #[test]
    fn welcome_fills_display_name() {
        let script = Script::bundled().unwrap();
        let text = script.welcome_for("阿明");
        assert!(text.starts_with("Hi！阿明👋\n"));
        assert!(!text.contains(DISPLAY_NAME_PLACEHOLDER));
    }

    #[test]
    fn dangling_button_is_rejected() {
        let yaml = r#"
welcome: hi
fallback: nope
rules:
  - id: ask
    match: ["start"]
    next: await_slogan
    responses:
      - type: buttonPrompt
        altText: pick
        title: Pick
        body: Pick one
        options:
          - { label: A, text: a }
"#;
        let script = Script::from_yaml(yaml).unwrap();
        let err = script.validate().unwrap_err().to_string();
        assert!(err.contains("rule ask"), "{}", err);
        assert!(err.contains("\"a\""), "{}", err);
    }

    #[test]
    fn button_must_be_legal_at_next_stage() {
        // "a" exists, but only at await_doctor_name, not where the prompt leads.
        let yaml = r#"
welcome: hi
fallback: nope
rules:
  - id: ask
    match: ["start"]
    next: await_slogan
    responses:
      - type: buttonPrompt
        altText: pick
        title: Pick
        body: Pick one
        options:
          - { label: A, text: a }
  - id: answer
    match: ["a"]
    from: [await_doctor_name]
    next: end
    responses:
      - type: text
        body: ok
"#;
        let script = Script::from_yaml(yaml).unwrap();
        assert!(script.validate().is_err());
    }

    #[test]
    fn too_many_responses_is_rejected() {
        let mut script = Script::bundled().unwrap();
        let extra = MessageDescriptor::text("more");
        let rule = &mut script.rules[1];
        while rule.responses.len() <= MAX_REPLY_MESSAGES {
            rule.responses.push(extra.clone());
        }
        let err = script.validate().unwrap_err().to_string();
        assert!(err.contains("rule slogan"), "{}", err);
    }

    #[test]
    fn upper_case_literal_on_case_insensitive_rule_is_rejected() {
        let mut script = Script::bundled().unwrap();
        script.rules[0].match_text = vec!["GoGo".to_string()];
        assert!(script.validate().is_err());
    }

    #[test]
    fn unknown_rule_field_fails_to_parse() {
        let yaml = r#"
welcome: hi
fallback: nope
rules:
  - id: r
    match: ["x"]
    next: end
    reponses: []
"#;
        assert!(matches!(Script::from_yaml(yaml), Err(ScriptError::Parse(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Script::load(Path::new("/nonexistent/houtong/script.yaml")).unwrap_err();
        assert!(matches!(err, ScriptError::Io { .. }));
    }
}
