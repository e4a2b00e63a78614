//! Dialogue dispatcher: exact-match lookup from user input to a rule's replies.
//!
//! Two lookups share one table. [`Dispatcher::dispatch`] searches every rule
//! (the first rule in table order wins). [`Dispatcher::dispatch_at`] only
//! considers rules legal at the caller's current [`Stage`], which is what the
//! tour engine uses when sessions are scoped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::message::MessageDescriptor;
use crate::script::{Script, ScriptError};

/// Narrative checkpoints of the tour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Start,
    AwaitGoGo,
    AwaitSlogan,
    AwaitShrineName,
    AwaitAmericanAidHousing,
    AwaitResidencyAnswer,
    AwaitClinicName,
    AwaitDoctorName,
    AwaitAck,
    AwaitBridgeAnswer,
    AwaitFinalAnswer,
    End,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::AwaitGoGo => "await_go_go",
            Stage::AwaitSlogan => "await_slogan",
            Stage::AwaitShrineName => "await_shrine_name",
            Stage::AwaitAmericanAidHousing => "await_american_aid_housing",
            Stage::AwaitResidencyAnswer => "await_residency_answer",
            Stage::AwaitClinicName => "await_clinic_name",
            Stage::AwaitDoctorName => "await_doctor_name",
            Stage::AwaitAck => "await_ack",
            Stage::AwaitBridgeAnswer => "await_bridge_answer",
            Stage::AwaitFinalAnswer => "await_final_answer",
            Stage::End => "end",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one dispatch: the matched rule and where it leads, or the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    /// Id of the matched rule; `None` for the fallback.
    pub rule_id: Option<String>,
    /// Stage after this reply; `None` leaves the caller's stage unchanged.
    pub next: Option<Stage>,
    /// Messages for a single reply, in order.
    pub messages: Vec<MessageDescriptor>,
}

impl DispatchResult {
    pub fn is_fallback(&self) -> bool {
        self.rule_id.is_none()
    }
}

/// Immutable rule table with literal indexes, built once from a validated [`Script`].
#[derive(Debug)]
pub struct Dispatcher {
    script: Script,
    /// Literal -> rule indexes (ascending) for case-sensitive rules.
    exact: HashMap<String, Vec<usize>>,
    /// Lower-cased literal -> rule indexes (ascending) for case-insensitive rules.
    folded: HashMap<String, Vec<usize>>,
}

impl Dispatcher {
    /// Validate the script and index its literals.
    pub fn new(script: Script) -> Result<Self, ScriptError> {
        script.validate()?;
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut folded: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, rule) in script.rules.iter().enumerate() {
            let index = if rule.case_insensitive {
                &mut folded
            } else {
                &mut exact
            };
            for m in &rule.match_text {
                let slot = index.entry(m.clone()).or_default();
                if !slot.contains(&i) {
                    slot.push(i);
                }
            }
        }
        Ok(Self {
            script,
            exact,
            folded,
        })
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Stateless lookup over the whole table. `text` must already be trimmed.
    pub fn dispatch(&self, text: &str) -> DispatchResult {
        self.resolve(text, |_| true)
    }

    /// Lookup restricted to rules legal at `stage`. `text` must already be trimmed.
    pub fn dispatch_at(&self, stage: Stage, text: &str) -> DispatchResult {
        self.resolve(text, |i| self.script.rules[i].legal_at(stage))
    }

    /// The fallback reply (single text message).
    pub fn fallback(&self) -> DispatchResult {
        DispatchResult {
            rule_id: None,
            next: None,
            messages: vec![MessageDescriptor::text(self.script.fallback.clone())],
        }
    }

    fn resolve(&self, text: &str, legal: impl Fn(usize) -> bool) -> DispatchResult {
        debug_assert_eq!(text, text.trim(), "dispatch input must be trimmed");
        let folded_key = text.to_lowercase();
        let mut candidates: Vec<usize> = self
            .exact
            .get(text)
            .into_iter()
            .chain(self.folded.get(&folded_key))
            .flatten()
            .copied()
            .collect();
        candidates.sort_unstable();
        match candidates.into_iter().find(|&i| legal(i)) {
            Some(i) => {
                let rule = &self.script.rules[i];
                DispatchResult {
                    rule_id: Some(rule.id.clone()),
                    next: Some(rule.next),
                    messages: rule.responses.clone(),
                }
            }
            None => self.fallback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ButtonOption;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Script::bundled().unwrap()).unwrap()
    }

    #[test]
    fn unknown_input_returns_single_fallback() {
        let d = dispatcher();
        for input in ["", "hello", "go go", "福正", "是的", "捨石", "GOGO!"] {
            let r = d.dispatch(input);
            assert!(r.is_fallback(), "{:?}", input);
            assert_eq!(r.next, None);
            assert_eq!(r.messages, vec![MessageDescriptor::text("不對哦！再想想看")]);
        }
    }

    #[test]
    fn gogo_is_case_insensitive() {
        let d = dispatcher();
        let lower = d.dispatch("gogo");
        assert_eq!(lower.rule_id.as_deref(), Some("gogo"));
        assert_eq!(lower.next, Some(Stage::AwaitSlogan));
        assert_eq!(lower.messages.len(), 3);
        assert_eq!(d.dispatch("GOGO"), lower);
        assert_eq!(d.dispatch("GoGo"), lower);
    }

    #[test]
    fn other_rules_are_case_sensitive() {
        let d = dispatcher();
        let mut script = Script::bundled().unwrap();
        script.rules.push(crate::script::Rule {
            id: "latin".to_string(),
            match_text: vec!["Bridge".to_string()],
            case_insensitive: false,
            from: Vec::new(),
            next: Stage::End,
            responses: vec![MessageDescriptor::text("ok")],
        });
        let custom = Dispatcher::new(script).unwrap();
        assert_eq!(custom.dispatch("Bridge").rule_id.as_deref(), Some("latin"));
        assert!(custom.dispatch("bridge").is_fallback());
        assert!(d.dispatch("Bridge").is_fallback());
    }

    #[test]
    fn no_answer_is_stateless() {
        let d = dispatcher();
        let first = d.dispatch("否");
        for _ in 0..5 {
            assert_eq!(d.dispatch("否"), first);
        }
        assert_eq!(first.next, Some(Stage::AwaitResidencyAnswer));
        assert_eq!(first.messages.len(), 1);
        assert_eq!(first.messages[0].kind(), "buttonPrompt");
    }

    #[test]
    fn bridge_answers() {
        let d = dispatcher();
        let correct = d.dispatch("橋墩");
        assert_eq!(correct.messages.len(), 4);
        assert_eq!(correct.next, Some(Stage::AwaitFinalAnswer));
        let kinds: Vec<_> = correct.messages.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, ["text", "image", "image", "text"]);

        let wrong_a = d.dispatch("下弦構材");
        let wrong_b = d.dispatch("橫樑");
        assert_eq!(wrong_a.messages.len(), 3);
        assert_eq!(wrong_a.messages, wrong_b.messages);
        assert_eq!(wrong_a.next, Some(Stage::AwaitBridgeAnswer));
        assert_eq!(wrong_a.messages[2].kind(), "buttonPrompt");
    }

    #[test]
    fn button_options_feed_back_into_table() {
        let d = dispatcher();
        let prompts: Vec<MessageDescriptor> = ["美援厝", "太好了"]
            .iter()
            .flat_map(|input| d.dispatch(input).messages)
            .filter(|m| !m.options().is_empty())
            .collect();
        assert_eq!(prompts.len(), 2);
        for prompt in &prompts {
            for option in prompt.options() {
                assert!(
                    !d.dispatch(&option.text).is_fallback(),
                    "dangling option {:?}",
                    option.text
                );
            }
        }
    }

    #[test]
    fn american_aid_housing_scenario() {
        let d = dispatcher();
        let r = d.dispatch("美援厝");
        assert_eq!(r.messages.len(), 2);
        match &r.messages[0] {
            MessageDescriptor::FlexCard { alt_text, .. } => assert_eq!(alt_text, "滿版圖片"),
            other => panic!("expected flex card, got {:?}", other),
        }
        match &r.messages[1] {
            MessageDescriptor::ButtonPrompt { title, options, .. } => {
                assert_eq!(title, "美援厝居住狀況");
                assert_eq!(
                    options,
                    &vec![
                        ButtonOption {
                            label: "是".to_string(),
                            text: "是".to_string()
                        },
                        ButtonOption {
                            label: "否".to_string(),
                            text: "否".to_string()
                        },
                    ]
                );
            }
            other => panic!("expected button prompt, got {:?}", other),
        }
        // "否" re-sends exactly the same prompt.
        assert_eq!(d.dispatch("否").messages[0], r.messages[1]);
    }

    #[test]
    fn duplicate_literal_resolves_by_table_order_globally() {
        let d = dispatcher();
        let r = d.dispatch("員工診所");
        assert_eq!(r.rule_id.as_deref(), Some("clinic"));
        assert_eq!(r.next, Some(Stage::AwaitDoctorName));
    }

    #[test]
    fn duplicate_literal_resolves_by_stage_when_scoped() {
        let d = dispatcher();
        let clinic = d.dispatch_at(Stage::AwaitClinicName, "員工診所");
        assert_eq!(clinic.rule_id.as_deref(), Some("clinic"));
        let finale = d.dispatch_at(Stage::AwaitFinalAnswer, "員工診所");
        assert_eq!(finale.rule_id.as_deref(), Some("finale"));
        assert_eq!(finale.next, Some(Stage::End));
        assert_eq!(finale.messages.len(), 3);
    }

    #[test]
    fn scoped_lookup_rejects_out_of_order_input() {
        let d = dispatcher();
        assert!(d.dispatch_at(Stage::AwaitSlogan, "美援厝").is_fallback());
        assert!(d.dispatch_at(Stage::End, "橋墩").is_fallback());
        // gogo is legal everywhere.
        assert_eq!(
            d.dispatch_at(Stage::End, "GoGo").next,
            Some(Stage::AwaitSlogan)
        );
    }

    #[test]
    #[should_panic(expected = "trimmed")]
    #[cfg(debug_assertions)]
    fn untrimmed_input_fails_loudly() {
        dispatcher().dispatch(" gogo ");
    }
}
