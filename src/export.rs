//! LaTeX quiz book built from a store.

use std::fs;
use std::path::Path;

use crate::record::Challenge;
use crate::store::Store;
use crate::{Error, Result};

const PREAMBLE: &[&str] = &[
    r"\documentclass[11pt]{article}",
    r"\usepackage[utf8]{inputenc}",
    r"\usepackage[T1]{fontenc}",
    r"\usepackage{lmodern}",
    r"\usepackage{textgreek}",
    r"\usepackage{fullpage}",
    r"\usepackage{graphicx}",
    "",
    r"\title{NEJM Image Challenge}",
    r"\author{}",
    r"\date{}",
    "",
    r"\begin{document}",
    r"\maketitle",
    r"\tableofcontents",
    r"\newpage",
    "",
];

const IMAGE_SIZE: &str = r"width=0.90\textwidth,height=0.50\textheight,keepaspectratio";

/// Renders every challenge, in id order, as one LaTeX document.
///
/// Image references are resolved against `image_root`, the directory the
/// store file lives in. Missing images get a note instead of a figure.
pub fn render(store: &Store, image_root: &Path) -> String {
    let mut lines: Vec<String> = PREAMBLE.iter().map(|l| l.to_string()).collect();

    for (n, challenge) in store.iter().enumerate() {
        if n > 0 {
            lines.push(r"\newpage".into());
            lines.push(String::new());
        }
        section(&mut lines, n + 1, challenge, image_root);
    }

    lines.push(r"\end{document}".into());
    let mut doc = lines.join("\n");
    doc.push('\n');
    doc
}

fn section(lines: &mut Vec<String>, n: usize, c: &Challenge, image_root: &Path) {
    lines.push(format!(r"\section*{{Question {n} (ID: {})}}", c.id));
    let date = if c.date.is_empty() { "Unknown date" } else { c.date.as_str() };
    lines.push(format!(r"\textbf{{Date: }}{}", escape(date)));
    lines.push(r"\vspace{6pt}".into());
    lines.push(String::new());

    lines.push(escape(&c.question));
    lines.push(r"\vspace{12pt}".into());
    lines.push(String::new());

    lines.push(r"\textbf{Options:}".into());
    lines.push(r"\begin{enumerate}".into());
    for (label, text) in &c.options {
        lines.push(format!(r"\item[{}.] {}", label.as_str(), escape(text)));
    }
    lines.push(r"\end{enumerate}".into());
    lines.push(String::new());

    if let Some(answer) = c.answer {
        lines.push(format!(r"\textbf{{Answer: }}{}", answer.as_str()));
        lines.push(r"\vspace{12pt}".into());
        lines.push(String::new());
    }

    if let Some(image) = &c.image {
        if image_root.join(image).is_file() {
            lines.push(r"\textbf{Image:}".into());
            lines.push(r"\begin{center}".into());
            lines.push(format!(
                r"\includegraphics[{IMAGE_SIZE}]{{{}}}",
                image.replace('\\', "/")
            ));
            lines.push(r"\end{center}".into());
        } else {
            lines.push(format!(r"\textit{{[Image not found: {}]}}", escape(image)));
        }
        lines.push(r"\vspace{12pt}".into());
    }
}

/// Escapes LaTeX special characters and folds typographic punctuation to
/// ASCII. Control characters and combining marks are dropped.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' | '\t' => out.push(ch),
            '\u{0}'..='\u{1f}' | '\u{80}'..='\u{9f}' | '\u{300}'..='\u{36f}' => {}
            '\\' => out.push_str(r"\textbackslash{}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201c}' | '\u{201d}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            _ => out.push(ch),
        }
    }
    out
}

/// Loads the store at `input` and writes its LaTeX rendering to `output`.
pub fn export(input: &Path, output: &Path) -> Result<usize> {
    let store = Store::load(input)?;
    let image_root = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    fs::write(output, render(&store, image_root)).map_err(|source| Error::Persistence {
        path: output.to_path_buf(),
        source,
    })?;
    Ok(store.len())
}
