//! Prompt and fallback text.

use super::ExplanationText;
use crate::catalog::{Remedy, TreatmentRecord};
use crate::label::DiseaseLabel;
use leafdoc_types::Confidence;
use std::fmt::Write as _;

const NONE_PLACEHOLDER: &str = "(none)";

const GENERIC_CAUSES: &str = "Leaf diseases are most often caused by fungal or bacterial \
pathogens. They spread in humid conditions with poor airflow, through splashing water, and from \
infected plant debris left in the soil.";

const GENERIC_SYMPTOMS: &str = "Typical signs are spots or lesions on the leaf surface, \
discoloration or yellowing, curling of the leaf edges, and visible mold growth on the underside \
of the leaf.";

/// Instruction prompt sent to the local language model.
pub fn build_prompt(label: DiseaseLabel, confidence: Option<Confidence>) -> String {
    let mut prompt = String::from("You are an agricultural expert.\n\n");
    let _ = writeln!(prompt, "The detected plant disease is: {label}");
    if let Some(confidence) = confidence {
        let _ = writeln!(prompt, "Classifier confidence: {confidence}");
    }
    prompt.push_str(
        "\nEven if the diagnosis is uncertain or confidence is low,\n\
         you MUST still explain based on common cases.\n\n\
         Explain clearly in this format:\n\n\
         Disease Overview:\n(short explanation)\n\n\
         Possible Causes:\n- cause 1\n- cause 2\n\n\
         Common Symptoms:\n- symptom 1\n- symptom 2\n\n\
         Suggested Solutions:\n- organic solution\n- chemical solution\n- prevention tips\n\n\
         Use simple language.\n\
         Do NOT say you are unsure.\n\
         Do NOT refuse to answer.\n",
    );
    prompt
}

/// Deterministic explanation built only from local data.
pub fn fallback_explanation(
    label: DiseaseLabel,
    confidence: Option<Confidence>,
    treatment: &TreatmentRecord,
) -> ExplanationText {
    let mut text = String::from("Disease Overview:\n");
    match confidence {
        Some(confidence) => {
            let _ = writeln!(text, "{label} (confidence: {confidence})");
        }
        None => {
            let _ = writeln!(text, "{label}");
        }
    }

    let _ = write!(
        text,
        "\nPossible Causes:\n{GENERIC_CAUSES}\n\nCommon Symptoms:\n{GENERIC_SYMPTOMS}\n\n\
         Suggested Solutions:\n"
    );
    push_section(&mut text, "Organic:", treatment.organic.iter().map(remedy_name));
    push_section(&mut text, "Chemical:", treatment.chemical.iter().map(remedy_name));
    push_section(
        &mut text,
        "Prevention:",
        treatment.prevention.iter().map(String::as_str),
    );

    ExplanationText::new(&text).expect("fallback text always has a header")
}

fn remedy_name(remedy: &Remedy) -> &str {
    &remedy.name
}

fn push_section<'a>(text: &mut String, header: &str, items: impl Iterator<Item = &'a str>) {
    text.push_str(header);
    text.push('\n');
    let mut any = false;
    for item in items {
        any = true;
        let _ = writeln!(text, "- {item}");
    }
    if !any {
        let _ = writeln!(text, "- {NONE_PLACEHOLDER}");
    }
}

/// Bullet items listed directly under `header`.
#[cfg(test)]
pub(crate) fn section_items<'a>(text: &'a str, header: &str) -> Vec<&'a str> {
    text.lines()
        .skip_while(|line| line.trim() != header)
        .skip(1)
        .map_while(|line| line.strip_prefix("- "))
        .collect()
}
