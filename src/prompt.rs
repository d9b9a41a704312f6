//! Prompt para el modelo de visión.
//!
//! Las instrucciones van en inglés (es el idioma que mejor siguen los modelos
//! multimodales locales) y obligan a razonar en tres pasos antes de emitir el
//! JSON que después interpreta `analysis::parse_model_output`.

/// Construye el prompt de análisis incrustando el contexto libre del usuario.
/// Es una función pura: el mismo contexto produce siempre el mismo texto.
pub fn build_analysis_prompt(context: &str) -> String {
    format!(
        r#"Act as an expert Philippine Agricultural System. Analyze this image.

Context provided: {context}

STEP 1: VISUAL IDENTIFICATION (Reasoning)
- Look at the image content. What is the main subject?
- Is it a CROP (rice, corn, vegetable, fruit) or a PEST on a plant?
- IF the image is a person, selfie, car, document, room, animal, or blurry object: MARK "is_agricultural" AS FALSE.

STEP 2: DIAGNOSIS (Only if Agricultural)
- Identify the specific plant.
- Check for specific symptoms: leaf spots, yellowing, holes, or visible insects.
- If no symptoms are visible, mark as "Healthy".

STEP 3: GENERATE RESPONSE
- Create a "natural_response": A helpful, polite sentence for the farmer in English.
  - If NOT agricultural, say: "I cannot analyze this. It looks like a [object], not a crop."
  - If agricultural, explain what you see naturally.

Output VALID JSON ONLY, with no text before or after it:
{{
    "is_agricultural": boolean,
    "plant_name": "string or 'Unknown'",
    "detected_issue": "string (e.g. 'Stem Borer', 'Rice Blast', 'None')",
    "condition": "Healthy" | "Pest Detected" | "Disease Detected" | "N/A",
    "confidence_score": number (0-100),
    "natural_response": "string"
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_context_verbatim() {
        let prompt = build_analysis_prompt("Rice field in Nueva Ecija, wet season");
        assert!(prompt.contains("Context provided: Rice field in Nueva Ecija, wet season\n"));
    }

    #[test]
    fn empty_context_is_allowed() {
        let prompt = build_analysis_prompt("");
        assert!(prompt.contains("Context provided: \n"));
    }

    #[test]
    fn steps_appear_in_order() {
        let prompt = build_analysis_prompt("");
        let step1 = prompt.find("STEP 1").unwrap();
        let step2 = prompt.find("STEP 2").unwrap();
        let step3 = prompt.find("STEP 3").unwrap();
        let json = prompt.find("Output VALID JSON ONLY").unwrap();
        assert!(step1 < step2 && step2 < step3 && step3 < json);
    }

    #[test]
    fn lists_rejected_subjects_and_rejection_template() {
        let prompt = build_analysis_prompt("");
        for subject in ["person", "selfie", "car", "document", "room", "animal", "blurry"] {
            assert!(prompt.contains(subject), "missing {subject}");
        }
        assert!(prompt.contains("I cannot analyze this. It looks like a [object], not a crop."));
    }

    #[test]
    fn requests_every_schema_field() {
        let prompt = build_analysis_prompt("");
        for field in [
            "\"is_agricultural\"",
            "\"plant_name\"",
            "\"detected_issue\"",
            "\"condition\"",
            "\"confidence_score\"",
            "\"natural_response\"",
        ] {
            assert!(prompt.contains(field), "missing {field}");
        }
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(build_analysis_prompt("corn"), build_analysis_prompt("corn"));
    }
}
