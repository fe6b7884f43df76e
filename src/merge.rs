//! Reconciles a freshly extracted challenge with the one already stored.
//!
//! Pure: no I/O happens here, the caller hands in both values.
//!
//! - `question`, `date`: the incoming value wins unless it is blank.
//! - `options`: per label union, incoming wins where both have the label.
//! - `image`, `answer`: whichever is present; if both are, the stored one
//!   wins. Once known they are never lost.

use crate::record::Challenge;
use crate::{Error, Result};

pub fn reconcile(incoming: Challenge, existing: Option<&Challenge>) -> Result<Challenge> {
    let Some(existing) = existing else {
        return Ok(incoming);
    };
    if incoming.id != existing.id {
        return Err(Error::IdentityMismatch {
            incoming: incoming.id,
            existing: existing.id,
        });
    }

    let mut options = existing.options.clone();
    options.extend(
        incoming
            .options
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty()),
    );

    Ok(Challenge {
        id: incoming.id,
        date: prefer_text(incoming.date, &existing.date),
        question: prefer_text(incoming.question, &existing.question),
        options,
        image: present(existing.image.clone()).or(present(incoming.image)),
        answer: existing.answer.or(incoming.answer),
    })
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn prefer_text(incoming: String, existing: &str) -> String {
    if incoming.trim().is_empty() {
        existing.to_string()
    } else {
        incoming
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::ChallengeId;
    use crate::record::Label;

    fn id(s: &str) -> ChallengeId {
        s.parse().unwrap()
    }

    fn sample() -> Challenge {
        Challenge::new(id("20051013"))
            .with_question("A 50-year-old man presented with a rash.")
            .with_option(Label::A, "Psoriasis")
            .with_option(Label::B, "Lichen planus")
    }

    #[test]
    fn test_first_capture_is_unchanged() {
        let incoming = sample().with_image(Some("images/nejm_20051013.jpg"));
        assert_eq!(reconcile(incoming.clone(), None).unwrap(), incoming);
    }

    #[test]
    fn test_mismatched_ids_fail() {
        let other = Challenge::new(id("20051020"));
        let err = reconcile(sample(), Some(&other)).unwrap_err();
        assert!(matches!(err, Error::IdentityMismatch { .. }));
    }

    #[test]
    fn test_answer_and_image_fill_from_either_side() {
        let x = id("20051013");
        let incoming = Challenge::new(x).with_image(Some("a.jpg"));
        let existing = Challenge::new(x).with_answer(Some(Label::B));

        let merged = reconcile(incoming, Some(&existing)).unwrap();
        assert_eq!(merged.id, x);
        assert_eq!(merged.answer, Some(Label::B));
        assert_eq!(merged.image.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_existing_answer_and_image_win_when_both_present() {
        let incoming = sample()
            .with_image(Some("https://cdn.example/transient.jpg"))
            .with_answer(Some(Label::A));
        let existing = sample()
            .with_image(Some("images/curated.jpg"))
            .with_answer(Some(Label::C));

        let merged = reconcile(incoming, Some(&existing)).unwrap();
        assert_eq!(merged.image.as_deref(), Some("images/curated.jpg"));
        assert_eq!(merged.answer, Some(Label::C));
    }

    #[test]
    fn test_incoming_text_wins_unless_blank() {
        let existing = sample();
        let incoming = Challenge::new(existing.id).with_question("Improved question text.");
        let merged = reconcile(incoming, Some(&existing)).unwrap();
        assert_eq!(merged.question, "Improved question text.");

        let mut blank = Challenge::new(existing.id);
        blank.date = "   ".into();
        let merged = reconcile(blank, Some(&existing)).unwrap();
        assert_eq!(merged.question, existing.question);
        assert_eq!(merged.date, existing.date);
    }

    #[test]
    fn test_options_merge_per_label() {
        let existing = sample();
        let incoming = Challenge::new(existing.id)
            .with_option(Label::B, "Lichen planus (revised)")
            .with_option(Label::C, "Sarcoidosis");

        let merged = reconcile(incoming, Some(&existing)).unwrap();
        assert_eq!(merged.options.len(), 3);
        assert_eq!(merged.options[&Label::A], "Psoriasis");
        assert_eq!(merged.options[&Label::B], "Lichen planus (revised)");
        assert_eq!(merged.options[&Label::C], "Sarcoidosis");
    }

    #[test]
    fn test_blank_option_and_missing_option_merge_alike() {
        let existing = sample();

        let missing = Challenge::new(existing.id).with_option(Label::B, "New B");
        let mut blank = missing.clone();
        // Bypass the builder to hold a blank value directly.
        blank.options.insert(Label::A, String::new());

        let from_missing = reconcile(missing, Some(&existing)).unwrap();
        let from_blank = reconcile(blank, Some(&existing)).unwrap();
        assert_eq!(from_missing.options[&Label::A], "Psoriasis");
        assert_eq!(from_blank.options[&Label::A], "Psoriasis");
        assert_eq!(from_missing, from_blank);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let existing = sample().with_answer(Some(Label::A));
        let incoming = Challenge::new(existing.id)
            .with_question("Re-fetched question.")
            .with_option(Label::D, "Tinea")
            .with_image(Some("images/nejm_20051013.jpg"));

        let once = reconcile(incoming, Some(&existing)).unwrap();
        let twice = reconcile(once.clone(), Some(&existing)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_answer_survives_repeated_null_merges() {
        let mut stored = sample().with_answer(Some(Label::B));
        for _ in 0..5 {
            let refetch = sample().with_answer(None).with_image(None::<String>);
            stored = reconcile(refetch, Some(&stored)).unwrap();
            assert_eq!(stored.answer, Some(Label::B));
        }
    }
}
