use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::ident::ChallengeId;
use crate::{Error, Result};

/// Answer option label. Labels are the identity of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    A,
    B,
    C,
    D,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::A, Label::B, Label::C, Label::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::A => "A",
            Label::B => "B",
            Label::C => "C",
            Label::D => "D",
        }
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Label::A),
            "B" => Ok(Label::B),
            "C" => Ok(Label::C),
            "D" => Ok(Label::D),
            _ => Err(Error::Parse(format!("'{s}' is not an option label (A-D)"))),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

pub type Options = BTreeMap<Label, String>;

/// One challenge, as persisted in the store.
///
/// Blank strings and missing values are the same thing here: `question` and
/// `date` use the empty string, `image` and `answer` use `None`, and an
/// option label with blank text is simply not present. Deserialization
/// normalizes to that form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    #[serde(default, deserialize_with = "text")]
    pub date: String,
    #[serde(default, deserialize_with = "text")]
    pub question: String,
    #[serde(default, deserialize_with = "options")]
    pub options: Options,
    #[serde(default, deserialize_with = "optional_text")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "optional_label")]
    pub answer: Option<Label>,
}

impl Challenge {
    /// An empty record for `id` with only the derived date filled in.
    pub fn new(id: ChallengeId) -> Self {
        Self {
            id,
            date: id.display_date(),
            question: String::new(),
            options: Options::new(),
            image: None,
            answer: None,
        }
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into().trim().to_string();
        self
    }

    /// Sets `label`'s text. Blank text removes the label.
    pub fn with_option(mut self, label: Label, text: impl Into<String>) -> Self {
        let text = text.into();
        match text.trim() {
            "" => self.options.remove(&label),
            t => self.options.insert(label, t.to_string()),
        };
        self
    }

    pub fn with_image(mut self, image: Option<impl Into<String>>) -> Self {
        self.image = image.map(Into::into).filter(|i| !i.trim().is_empty());
        self
    }

    pub fn with_answer(mut self, answer: Option<Label>) -> Self {
        self.answer = answer;
        self
    }

    /// Both the answer and the image are known; re-fetching can't add anything.
    pub fn is_resolved(&self) -> bool {
        self.answer.is_some() && self.image.is_some()
    }
}

fn text<'de, D: Deserializer<'de>>(d: D) -> core::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?
        .map(|s| s.trim().to_string())
        .unwrap_or_default())
}

fn optional_text<'de, D: Deserializer<'de>>(d: D) -> core::result::Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.filter(|s| !s.trim().is_empty()))
}

fn optional_label<'de, D: Deserializer<'de>>(d: D) -> core::result::Result<Option<Label>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

fn options<'de, D: Deserializer<'de>>(d: D) -> core::result::Result<Options, D::Error> {
    let raw = Option::<BTreeMap<Label, Option<String>>>::deserialize(d)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(label, text)| {
            let text = text?.trim().to_string();
            (!text.is_empty()).then_some((label, text))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ChallengeId {
        "20051013".parse().unwrap()
    }

    #[test]
    fn test_new_fills_derived_date() {
        let c = Challenge::new(id());
        assert_eq!(c.date, "October 13,2005");
        assert!(c.question.is_empty());
        assert!(!c.is_resolved());
    }

    #[test]
    fn test_label_parse_is_case_insensitive() {
        assert_eq!(" b ".parse::<Label>().unwrap(), Label::B);
        assert!("E".parse::<Label>().is_err());
    }

    #[test]
    fn test_serializes_lowercase_fields_and_label_map() {
        let c = Challenge::new(id())
            .with_question("What is the diagnosis?")
            .with_option(Label::B, "Gout")
            .with_option(Label::A, "Psoriasis")
            .with_answer(Some(Label::A));
        let json = serde_json::to_value(&c).unwrap();

        assert_eq!(json["id"], "20051013");
        assert_eq!(json["date"], "October 13,2005");
        assert_eq!(json["options"]["A"], "Psoriasis");
        assert_eq!(json["options"]["B"], "Gout");
        assert_eq!(json["answer"], "A");
        assert!(json["image"].is_null());
    }

    #[test]
    fn test_blank_and_missing_values_deserialize_alike() {
        let blank: Challenge = serde_json::from_str(
            r#"{"id": "20051013", "date": "", "question": "  ",
                "options": {"A": "Lichen planus", "B": "", "C": null},
                "image": "", "answer": ""}"#,
        )
        .unwrap();
        let missing: Challenge = serde_json::from_str(
            r#"{"id": 20051013, "options": {"A": "Lichen planus"}, "image": null, "answer": null}"#,
        )
        .unwrap();

        assert_eq!(blank, missing);
        assert_eq!(blank.options.len(), 1);
        assert_eq!(blank.image, None);
        assert_eq!(blank.answer, None);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let res = serde_json::from_str::<Challenge>(r#"{"id": "20051013", "answer": "Z"}"#);
        assert!(res.is_err());
        let res = serde_json::from_str::<Challenge>(r#"{"id": "20051013", "options": {"F": "x"}}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_blank_option_text_removes_label() {
        let c = Challenge::new(id())
            .with_option(Label::C, "Sarcoidosis")
            .with_option(Label::C, "   ");
        assert!(c.options.is_empty());
    }

    #[test]
    fn test_resolved_needs_answer_and_image() {
        let c = Challenge::new(id()).with_answer(Some(Label::D));
        assert!(!c.is_resolved());
        let c = c.with_image(Some("images/nejm_20051013.jpg"));
        assert!(c.is_resolved());
        let c = c.with_image(Some(""));
        assert!(!c.is_resolved());
    }
}
