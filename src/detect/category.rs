use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::result::DetectionKind;

/// Closed set of categories a type label is sorted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Structural,
    Moisture,
    Electrical,
    Plumbing,
    Safety,
    Finish,
    Biological,
    Weapon,
    Impression,
    Trace,
    Document,
    Disturbance,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Structural => "structural",
            Category::Moisture => "moisture",
            Category::Electrical => "electrical",
            Category::Plumbing => "plumbing",
            Category::Safety => "safety",
            Category::Finish => "finish",
            Category::Biological => "biological",
            Category::Weapon => "weapon",
            Category::Impression => "impression",
            Category::Trace => "trace",
            Category::Document => "document",
            Category::Disturbance => "disturbance",
            Category::Other => "other",
        }
    }
}

type Rule = (&'static [&'static str], Category);

// Rows are checked top to bottom; the first row with a keyword starting a word
// in the label wins. Stems such as "bulg" or "plumb" match any word they begin.
const DEFECT_RULES: &[Rule] = &[
    (
        &["crack", "fracture", "spall", "settlement", "sag", "bulg", "foundation", "beam"],
        Category::Structural,
    ),
    (
        &["water", "leak", "moisture", "damp", "mold", "mould", "stain", "rot", "efflorescence"],
        Category::Moisture,
    ),
    (
        &["wire", "wiring", "outlet", "socket", "electrical", "breaker", "junction"],
        Category::Electrical,
    ),
    (&["pipe", "drain", "plumb", "faucet", "corrosion", "rust"], Category::Plumbing),
    (
        &["trip", "hazard", "railing", "handrail", "loose", "missing", "uneven"],
        Category::Safety,
    ),
    (
        &["paint", "peel", "chip", "scratch", "dent", "finish", "tile", "grout", "caulk"],
        Category::Finish,
    ),
];

const EVIDENCE_RULES: &[Rule] = &[
    (
        &["blood", "spatter", "fluid", "saliva", "tissue", "vomit"],
        Category::Biological,
    ),
    (
        &[
            "weapon", "knife", "blade", "gun", "firearm", "pistol", "rifle", "cartridge", "casing",
            "bullet", "ammunition",
        ],
        Category::Weapon,
    ),
    (
        &["fingerprint", "footprint", "shoeprint", "print", "tire", "tool mark", "impression"],
        Category::Impression,
    ),
    (
        &["fiber", "fibre", "hair", "glass", "powder", "residue", "soil"],
        Category::Trace,
    ),
    (
        &["document", "paper", "note", "receipt", "letter", "card", "wallet", "phone"],
        Category::Document,
    ),
    (
        &["broken", "forced", "pry", "disturbed", "overturned", "damage"],
        Category::Disturbance,
    ),
];

fn compile(rules: &[Rule]) -> Vec<(Regex, Category)> {
    rules
        .iter()
        .map(|(keywords, category)| {
            let alternation = keywords
                .iter()
                .map(|kw| regex::escape(kw))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!(r"\b(?:{})", alternation))
                .expect("keyword pattern is valid");
            (re, *category)
        })
        .collect()
}

fn rules_for(kind: DetectionKind) -> &'static [(Regex, Category)] {
    static DEFECT_RE: OnceLock<Vec<(Regex, Category)>> = OnceLock::new();
    static EVIDENCE_RE: OnceLock<Vec<(Regex, Category)>> = OnceLock::new();
    match kind {
        DetectionKind::Defect => DEFECT_RE.get_or_init(|| compile(DEFECT_RULES)),
        DetectionKind::Evidence => EVIDENCE_RE.get_or_init(|| compile(EVIDENCE_RULES)),
    }
}

/// Sort a free-text type label into a [`Category`].
pub fn categorize(kind: DetectionKind, type_label: &str) -> Category {
    let label = type_label.to_lowercase();
    rules_for(kind)
        .iter()
        .find(|(re, _)| re.is_match(&label))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Other)
}
