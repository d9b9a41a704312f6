//! Base de conocimiento de plagas y enfermedades de cultivos en Filipinas.
//!
//! Se construye una vez al arrancar y nunca se modifica. El orden de inserción
//! de cada tabla es el orden de búsqueda, de modo que la coincidencia es
//! determinista.

use serde::Serialize;

use crate::models::KnowledgeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Pests,
    Diseases,
}

/// Entrada tal y como se expone por la API de consulta.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeEntry<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub record: &'a KnowledgeRecord,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    pests: Vec<(String, KnowledgeRecord)>,
    diseases: Vec<(String, KnowledgeRecord)>,
}

impl KnowledgeBase {
    /// Lista verificada de plagas y enfermedades filipinas.
    pub fn philippine() -> Self {
        Self {
            pests: build_pest_table(),
            diseases: build_disease_table(),
        }
    }

    /// Candidatos de una tabla en su orden fijo.
    pub fn candidates(&self, table: Table) -> &[(String, KnowledgeRecord)] {
        match table {
            Table::Pests => &self.pests,
            Table::Diseases => &self.diseases,
        }
    }

    pub fn get(&self, table: Table, id: &str) -> Option<&KnowledgeRecord> {
        self.candidates(table)
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, record)| record)
    }

    pub fn entries(&self, table: Table) -> Vec<KnowledgeEntry<'_>> {
        self.candidates(table)
            .iter()
            .map(|(id, record)| KnowledgeEntry { id, record })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pests.len() + self.diseases.len()
    }
}

fn record(
    scientific_name: &str,
    local_name: &str,
    crops_affected: &[&str],
    description: &str,
    control_methods: &[&str],
) -> KnowledgeRecord {
    KnowledgeRecord {
        scientific_name: scientific_name.to_string(),
        local_name: local_name.to_string(),
        crops_affected: crops_affected.iter().map(|s| s.to_string()).collect(),
        description: description.to_string(),
        control_methods: control_methods.iter().map(|s| s.to_string()).collect(),
    }
}

fn build_pest_table() -> Vec<(String, KnowledgeRecord)> {
    vec![
        (
            "armyworm".to_string(),
            record(
                "Spodoptera litura / frugiperda",
                "Harabas / Uod",
                &["rice", "corn", "onion"],
                "Larvae feed on leaves leaving only veins. Major pest in Nueva Ecija and Pangasinan.",
                &[
                    "Biological control (Trichogramma)",
                    "Spray Bacillus thuringiensis (Bt)",
                    "Use pheromone traps",
                ],
            ),
        ),
        (
            "rice_black_bug".to_string(),
            record(
                "Scotinophara coarctata",
                "Itim na Atangya",
                &["rice"],
                "Sucks sap from the base of the plant causing 'bugburn'. Common in Bicol and Visayas.",
                &[
                    "Light trapping during full moon",
                    "Herding ducks in the field",
                    "Submerge eggs by raising water level",
                ],
            ),
        ),
        (
            "brown_planthopper".to_string(),
            record(
                "Nilaparvata lugens",
                "Kayumangging Atangya",
                &["rice"],
                "Causes 'hopperburn' (browning and drying of crops). Transmits Ragged Stunt Virus.",
                &[
                    "Use resistant varieties (NSIC Rc)",
                    "Avoid excessive nitrogen fertilizer",
                    "Synchronous planting",
                ],
            ),
        ),
        (
            "corn_borer".to_string(),
            record(
                "Ostrinia furnacalis",
                "Uod ng Mais",
                &["corn"],
                "Larvae bore into stalks and ears. The most destructive corn pest in PH.",
                &[
                    "Detasseling",
                    "Trichogramma release",
                    "Planting Bt Corn (if approved)",
                ],
            ),
        ),
        (
            "cocolisap".to_string(),
            record(
                "Aspidiotus rigidus",
                "Cocolisap",
                &["coconut", "lanzones"],
                "Scale insects covering leaves, blocking photosynthesis. Historic outbreak in CALABARZON.",
                &[
                    "Pruning and burning affected parts",
                    "Systemic trunk injection (FPA approved)",
                    "Release of biocontrol agents",
                ],
            ),
        ),
        (
            "mango_cecid_fly".to_string(),
            record(
                "Procontarinia spp.",
                "Kurikong",
                &["mango"],
                "Causes circular, brown, scab-like lesions on fruit skin.",
                &[
                    "Pruning overcrowded branches",
                    "Bagging fruits early",
                    "Proper orchard sanitation",
                ],
            ),
        ),
        (
            "stem_borer".to_string(),
            record(
                "Scirpophaga incertulas",
                "Aksip / Stem Borer",
                &["rice"],
                "Larvae bore into stem causing 'deadheart' (young stage) or 'whitehead' (reproductive stage).",
                &[
                    "Light traps",
                    "Pheromone traps",
                    "Conservation of natural enemies",
                ],
            ),
        ),
    ]
}

fn build_disease_table() -> Vec<(String, KnowledgeRecord)> {
    vec![
        (
            "rice_blast".to_string(),
            record(
                "Magnaporthe oryzae",
                "Leeg-leeg (Neck Blast)",
                &["rice"],
                "Diamond-shaped lesions on leaves or rotting of the panicle neck.",
                &[
                    "Avoid excessive nitrogen",
                    "Keep field flooded",
                    "Use fungicides (Tricyclazole) as last resort",
                ],
            ),
        ),
        (
            "tungro".to_string(),
            record(
                "Rice Tungro Bacilliform Virus",
                "Tungro",
                &["rice"],
                "Yellow-orange discoloration of leaves, stunted growth. Vectored by Green Leafhopper.",
                &[
                    "Plant resistant varieties (Matatag lines)",
                    "Control leafhopper vectors",
                    "Roguing (removal) of infected plants",
                ],
            ),
        ),
        (
            "bacterial_leaf_blight".to_string(),
            record(
                "Xanthomonas oryzae",
                "Kuyog",
                &["rice"],
                "Yellowing and drying of leaf tips and margins. Common in wet season.",
                &[
                    "Balanced fertilization",
                    "Proper drainage",
                    "Clean field sanitation",
                ],
            ),
        ),
        (
            "panama_disease".to_string(),
            record(
                "Fusarium oxysporum TR4",
                "Fusarium Wilt",
                &["banana"],
                "Yellowing of older leaves, vascular discoloration. Major threat in Mindanao plantations.",
                &[
                    "Quarantine infected areas",
                    "Disinfect tools/footwear",
                    "Plant GCTCV-218 (resistant variety)",
                ],
            ),
        ),
    ]
}
