use std::collections::HashMap;

use scraper::{ElementRef, Html, Node, Selector};
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::ident::ChallengeId;
use crate::record::{Challenge, Label};
use crate::{Error, Result, MIN_OPTION_LEN, MIN_QUESTION_LEN};

/// Elements whose text never counts as visible page text.
const HIDDEN_ELEMENTS: [&str; 7] = [
    "script", "style", "noscript", "header", "footer", "nav", "svg",
];

const CLINICAL_KEYWORDS: [&str; 10] = [
    "patient",
    "presented",
    "symptoms",
    "diagnosed",
    "examination",
    "year",
    "old",
    "woman",
    "man",
    "history",
];
const NOISE_LINES: [&str; 5] = [
    "try again!",
    "submit",
    "back to image challenge",
    "see how others chose",
    "next challenge",
];
const EXPLANATION_MARKERS: [&str; 8] = [
    "this is",
    "this type",
    "characterized by",
    "is an",
    "is a",
    "can be",
    "may be",
    "results in",
];
const NAVIGATION_MARKERS: [&str; 3] = [
    "more image challenges",
    "total responses",
    "see how others",
];
const FEEDBACK_MARKERS: [&str; 3] = ["try again", "that is not", "correct answer"];

/// Parses a challenge page on a blocking thread; `Html` is not `Send`.
pub async fn extract(id: ChallengeId, html: String) -> Result<Challenge> {
    spawn_blocking(move || extract_document(id, &html)).await?
}

/// Extracts the question and options from a challenge page.
///
/// The page's quiz markup is tried first. Older or restyled pages fall back to
/// a heuristic over the visible text, where answer options are the lines that
/// the page repeats (once as a choice, once in the result breakdown).
pub fn extract_document(id: ChallengeId, html: &str) -> Result<Challenge> {
    let doc = Html::parse_document(html);

    let (question, options) = match extract_structured(&doc)? {
        Some(found) => found,
        None => {
            debug!(%id, "quiz markup missing, falling back to visible text");
            extract_from_text(&visible_text(&doc))
                .ok_or_else(|| Error::Parse(format!("no question and options found for {id}")))?
        }
    };

    Ok(options
        .into_iter()
        .fold(Challenge::new(id).with_question(question), |c, (label, text)| {
            c.with_option(label, text)
        }))
}

type Extracted = (String, Vec<(Label, String)>);

fn extract_structured(doc: &Html) -> Result<Option<Extracted>> {
    let content_selector = create_selector("div.image-challenge-qa_content")?;
    let right_selector = create_selector("div.image-challenge-qa_right")?;
    let question_selector = create_selector("div.image-challenge-qa_question")?;
    let answers_selector = create_selector("div.image-challenge-qa_answers")?;
    let option_selector = create_selector("span.radio--primary-label-text")?;

    let Some(right) = doc
        .select(&content_selector)
        .next()
        .and_then(|content| content.select(&right_selector).next())
    else {
        return Ok(None);
    };

    let question = match right.select(&question_selector).next() {
        Some(div) => element_text(div),
        // Some layouts have no dedicated question div; it's the second classed child.
        None => right
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "div" && e.value().attr("class").is_some())
            .nth(1)
            .map(element_text)
            .unwrap_or_default(),
    };
    if question.chars().count() < MIN_QUESTION_LEN {
        return Ok(None);
    }

    let Some(answers) = right.select(&answers_selector).next() else {
        return Ok(None);
    };

    let mut options: Vec<(Label, String)> = Vec::with_capacity(Label::ALL.len());
    for (label, span) in Label::ALL.into_iter().zip(answers.select(&option_selector)) {
        let text = element_text(span);
        if text.chars().count() > MIN_OPTION_LEN && !options.iter().any(|(_, t)| *t == text) {
            options.push((label, text));
        }
    }
    if options.is_empty() {
        return Ok(None);
    }

    Ok(Some((question, options)))
}

fn extract_from_text(text: &str) -> Option<Extracted> {
    let paragraphs = paragraphs(text);

    let (q_idx, question) = paragraphs
        .iter()
        .enumerate()
        .find(|(_, p)| {
            let lower = p.to_lowercase();
            p.chars().count() > 50 && CLINICAL_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .or_else(|| {
            paragraphs
                .iter()
                .enumerate()
                .find(|(_, p)| p.chars().count() > 50)
        })?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    let lines = paragraphs[q_idx + 1..]
        .iter()
        .flat_map(|p| p.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty());
    for line in lines {
        let lower = line.to_lowercase();
        if line.ends_with('%')
            || NOISE_LINES.contains(&lower.as_str())
            || line.chars().count() < 5
        {
            continue;
        }
        if EXPLANATION_MARKERS.iter().any(|m| lower.contains(m))
            || NAVIGATION_MARKERS.iter().any(|m| lower.contains(m))
        {
            break;
        }
        let count = counts.entry(line).or_insert(0);
        if *count == 0 {
            order.push(line);
        }
        *count += 1;
    }

    let options: Vec<(Label, String)> = order
        .into_iter()
        .filter(|line| counts[line] >= 2 && line.chars().count() > 15)
        .filter(|line| {
            let lower = line.to_lowercase();
            !FEEDBACK_MARKERS.iter().any(|m| lower.contains(m))
        })
        .zip(Label::ALL)
        .map(|(line, label)| (label, line.to_string()))
        .collect();
    if options.is_empty() {
        return None;
    }

    Some((question.clone(), options))
}

/// Text nodes outside of hidden elements, one per line.
fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| match a.value() {
            Node::Element(e) => HIDDEN_ELEMENTS.contains(&e.name()),
            _ => false,
        });
        if !hidden {
            out.push_str(text);
            out.push('\n');
        }
    }
    out
}

/// Splits on blank lines; every paragraph is trimmed and non-empty.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let normalized = text.replace('\r', "\n");
    let mut current: Vec<&str> = Vec::new();
    for line in normalized.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n").trim().to_string());
    }
    out
}

fn element_text(element: ElementRef<'_>) -> String {
    let raw = element.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
