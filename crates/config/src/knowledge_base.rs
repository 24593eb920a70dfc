//! Medical Knowledge Base
//!
//! A static, process-lifetime mapping loaded once and shared read-only
//! across concurrent invocations. Only the drug gazetteer is required;
//! every other table defaults to empty (no-op) when its file is absent.

use crate::ConfigError;
use medirx_core::prescription::Route;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Canonical generic drug entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drug {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub brand_names: Vec<String>,
    #[serde(default)]
    pub transliterations: Vec<String>,
    #[serde(default)]
    pub allowed_frequencies: Vec<String>,
}

/// Ordered regex correction, first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneticCorrection {
    pub pattern: String,
    pub replacement: String,
}

/// Anatomical context a diagnosis is allowed, or forbidden, to co-occur with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisAnatomy {
    pub diagnosis: String,
    #[serde(default)]
    pub allowed_anatomy: Vec<String>,
    #[serde(default)]
    pub forbidden_anatomy: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceTemplate {
    pub trigger_keyword: String,
    pub canonical_advice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DangerousCombination {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DrugTable {
    drugs: Vec<Drug>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PhoneticTable {
    corrections: Vec<PhoneticCorrection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FormRouteTable {
    forms: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DiagnosisTable {
    diagnoses: Vec<DiagnosisAnatomy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AdviceTable {
    templates: Vec<AdviceTemplate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DangerousTable {
    pairs: Vec<DangerousCombination>,
}

/// Static reference data shared read-only across every invocation.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    drugs: Vec<Drug>,
    drug_lookup: HashMap<String, usize>,
    phonetic_corrections: Vec<PhoneticCorrection>,
    form_route: HashMap<String, Route>,
    diagnoses: Vec<DiagnosisAnatomy>,
    advice_templates: Vec<AdviceTemplate>,
    dangerous_pairs: HashSet<(String, String)>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn normalized_pair(a: &str, b: &str) -> (String, String) {
    let (a, b) = (normalize(a), normalize(b));
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn parse_route(s: &str) -> Option<Route> {
    match s.to_lowercase().as_str() {
        "oral" => Some(Route::Oral),
        "nasal" => Some(Route::Nasal),
        "topical" => Some(Route::Topical),
        "ophthalmic" => Some(Route::Ophthalmic),
        "otic" => Some(Route::Otic),
        "inhaled" => Some(Route::Inhaled),
        "parenteral" => Some(Route::Parenteral),
        "rectal" => Some(Route::Rectal),
        _ => None,
    }
}

impl KnowledgeBase {
    /// Load every table from `dir`, one YAML file per table. `drugs.yaml`
    /// is required; every other file is optional and defaults to empty.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let drugs_path = dir.join("drugs.yaml");
        if !drugs_path.exists() {
            return Err(ConfigError::FileNotFound(drugs_path.display().to_string()));
        }
        let drug_table: DrugTable = read_yaml(&drugs_path)?;

        let phonetic_table: PhoneticTable =
            read_yaml_or_default(&dir.join("phonetic_corrections.yaml"))?;
        let form_table: FormRouteTable = read_yaml_or_default(&dir.join("forms.yaml"))?;
        let diagnosis_table: DiagnosisTable = read_yaml_or_default(&dir.join("diagnoses.yaml"))?;
        let advice_table: AdviceTable = read_yaml_or_default(&dir.join("advice.yaml"))?;
        let dangerous_table: DangerousTable =
            read_yaml_or_default(&dir.join("dangerous_combinations.yaml"))?;

        Self::assemble(
            drug_table,
            phonetic_table,
            form_table,
            diagnosis_table,
            advice_table,
            dangerous_table,
        )
    }

    /// A small built-in gazetteer, usable without filesystem fixtures.
    pub fn default_builtin() -> Self {
        let drugs = vec![
            Drug {
                canonical: "paracetamol".to_string(),
                aliases: vec!["acetaminophen".to_string()],
                brand_names: vec!["crocin".to_string(), "dolo".to_string()],
                transliterations: vec!["parasetamol".to_string()],
                allowed_frequencies: vec![
                    "once daily".to_string(),
                    "twice daily".to_string(),
                    "3 times a day".to_string(),
                    "as needed".to_string(),
                ],
            },
            Drug {
                canonical: "erythromycin".to_string(),
                aliases: vec![],
                brand_names: vec![],
                transliterations: vec![],
                allowed_frequencies: vec!["3 times a day".to_string(), "twice daily".to_string()],
            },
            Drug {
                canonical: "nitrofurantoin".to_string(),
                aliases: vec![],
                brand_names: vec!["stayhappi".to_string()],
                transliterations: vec![],
                allowed_frequencies: vec!["twice daily".to_string()],
            },
            Drug {
                canonical: "levocetirizine".to_string(),
                aliases: vec![],
                brand_names: vec![],
                transliterations: vec![],
                allowed_frequencies: vec!["once at night".to_string(), "once daily".to_string()],
            },
            Drug {
                canonical: "warfarin".to_string(),
                aliases: vec![],
                brand_names: vec![],
                transliterations: vec![],
                allowed_frequencies: vec!["once daily".to_string()],
            },
            Drug {
                canonical: "aspirin".to_string(),
                aliases: vec![],
                brand_names: vec![],
                transliterations: vec![],
                allowed_frequencies: vec!["once daily".to_string()],
            },
        ];

        let phonetic_corrections = vec![PhoneticCorrection {
            pattern: r"\binflection\b".to_string(),
            replacement: "infection".to_string(),
        }];

        let mut forms = HashMap::new();
        forms.insert("tablet".to_string(), "oral".to_string());
        forms.insert("syrup".to_string(), "oral".to_string());
        forms.insert("capsule".to_string(), "oral".to_string());
        forms.insert("spray".to_string(), "nasal".to_string());
        forms.insert("drops".to_string(), "ophthalmic".to_string());
        forms.insert("ear drops".to_string(), "otic".to_string());
        forms.insert("cream".to_string(), "topical".to_string());
        forms.insert("ointment".to_string(), "topical".to_string());
        forms.insert("inhaler".to_string(), "inhaled".to_string());
        forms.insert("injection".to_string(), "parenteral".to_string());
        forms.insert("suppository".to_string(), "rectal".to_string());

        let diagnoses = vec![
            DiagnosisAnatomy {
                diagnosis: "sinusitis".to_string(),
                allowed_anatomy: vec!["nasal".to_string(), "sinus".to_string()],
                forbidden_anatomy: vec!["pulmonary".to_string()],
            },
            DiagnosisAnatomy {
                diagnosis: "pharyngitis".to_string(),
                allowed_anatomy: vec!["throat".to_string()],
                forbidden_anatomy: vec![],
            },
        ];

        let advice_templates = vec![
            AdviceTemplate {
                trigger_keyword: "warm fluids".to_string(),
                canonical_advice: "drink warm fluids".to_string(),
            },
            AdviceTemplate {
                trigger_keyword: "rest".to_string(),
                canonical_advice: "rest adequately".to_string(),
            },
        ];

        let dangerous_pairs = [("warfarin", "aspirin")]
            .into_iter()
            .map(|(a, b)| normalized_pair(a, b))
            .collect();

        Self::assemble(
            DrugTable { drugs },
            PhoneticTable {
                corrections: phonetic_corrections,
            },
            FormRouteTable { forms },
            DiagnosisTable { diagnoses },
            AdviceTable {
                templates: advice_templates,
            },
            DangerousTable { pairs: vec![] },
        )
        .map(|mut kb| {
            kb.dangerous_pairs = dangerous_pairs;
            kb
        })
        .expect("builtin gazetteer is well-formed")
    }

    fn assemble(
        drug_table: DrugTable,
        phonetic_table: PhoneticTable,
        form_table: FormRouteTable,
        diagnosis_table: DiagnosisTable,
        advice_table: AdviceTable,
        dangerous_table: DangerousTable,
    ) -> Result<Self, ConfigError> {
        let mut drug_lookup = HashMap::new();
        for (idx, drug) in drug_table.drugs.iter().enumerate() {
            drug_lookup.insert(normalize(&drug.canonical), idx);
            for alias in drug
                .aliases
                .iter()
                .chain(drug.brand_names.iter())
                .chain(drug.transliterations.iter())
            {
                drug_lookup.entry(normalize(alias)).or_insert(idx);
            }
        }

        let mut form_route = HashMap::new();
        for (form, route_str) in &form_table.forms {
            if let Some(route) = parse_route(route_str) {
                form_route.insert(normalize(form), route);
            }
        }

        let dangerous_pairs = dangerous_table
            .pairs
            .iter()
            .map(|pair| normalized_pair(&pair.a, &pair.b))
            .collect();

        Ok(Self {
            drugs: drug_table.drugs,
            drug_lookup,
            phonetic_corrections: phonetic_table.corrections,
            form_route,
            diagnoses: diagnosis_table.diagnoses,
            advice_templates: advice_table.templates,
            dangerous_pairs,
        })
    }

    /// Look up a drug by canonical name, alias, brand name, or
    /// transliteration, case-insensitively.
    pub fn drug(&self, name: &str) -> Option<&Drug> {
        self.drug_lookup.get(&normalize(name)).map(|idx| &self.drugs[idx.to_owned()])
    }

    pub fn drugs(&self) -> &[Drug] {
        &self.drugs
    }

    pub fn phonetic_corrections(&self) -> &[PhoneticCorrection] {
        &self.phonetic_corrections
    }

    /// Canonical route for a dose-form term (e.g. "tablet" → oral).
    pub fn route_for_form(&self, form: &str) -> Option<Route> {
        self.form_route.get(&normalize(form)).copied()
    }

    /// All known form terms, for scanning a medicine's name/instruction.
    pub fn form_terms(&self) -> impl Iterator<Item = &str> {
        self.form_route.keys().map(|s| s.as_str())
    }

    pub fn diagnosis_anatomy(&self, diagnosis: &str) -> Option<&DiagnosisAnatomy> {
        self.diagnoses
            .iter()
            .find(|d| normalize(&d.diagnosis) == normalize(diagnosis))
    }

    pub fn advice_templates(&self) -> &[AdviceTemplate] {
        &self.advice_templates
    }

    pub fn is_dangerous_combination(&self, a: &str, b: &str) -> bool {
        self.dangerous_pairs.contains(&normalized_pair(a, b))
    }

    /// Whether `text` contains at least one gazetteer term: a drug name
    /// (canonical, alias, brand, or transliteration) or a known diagnosis.
    /// Used by the Transcriber's tier-escalation quality gate and the
    /// Router's medical-keyword-density score.
    pub fn medical_keyword_hit(&self, text: &str) -> bool {
        let lower = normalize(text);
        self.drug_lookup.keys().any(|term| lower.contains(term.as_str()))
            || self
                .diagnoses
                .iter()
                .any(|d| lower.contains(&normalize(&d.diagnosis)))
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
    serde_yaml::from_str(&content).map_err(ConfigError::from)
}

fn read_yaml_or_default<T: serde::de::DeserializeOwned + Default>(
    path: &Path,
) -> Result<T, ConfigError> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_yaml(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_gazetteer_resolves_brand_to_generic() {
        let kb = KnowledgeBase::default_builtin();
        let drug = kb.drug("stayhappi").expect("brand should resolve");
        assert_eq!(drug.canonical, "nitrofurantoin");
    }

    #[test]
    fn builtin_gazetteer_resolves_case_insensitively() {
        let kb = KnowledgeBase::default_builtin();
        assert!(kb.drug("PARACETAMOL").is_some());
    }

    #[test]
    fn route_for_form_maps_spray_to_nasal() {
        let kb = KnowledgeBase::default_builtin();
        assert_eq!(kb.route_for_form("spray"), Some(Route::Nasal));
    }

    #[test]
    fn dangerous_combination_is_symmetric() {
        let kb = KnowledgeBase::default_builtin();
        assert!(kb.is_dangerous_combination("warfarin", "aspirin"));
        assert!(kb.is_dangerous_combination("Aspirin", "Warfarin"));
        assert!(!kb.is_dangerous_combination("paracetamol", "aspirin"));
    }

    #[test]
    fn load_fails_without_drug_gazetteer() {
        let dir = tempfile::tempdir().unwrap();
        let err = KnowledgeBase::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_from_directory_with_only_drugs_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("drugs.yaml"),
            "drugs:\n  - canonical: paracetamol\n    allowed_frequencies: [\"once daily\"]\n",
        )
        .unwrap();
        let kb = KnowledgeBase::load(dir.path()).unwrap();
        assert!(kb.drug("paracetamol").is_some());
        assert!(kb.phonetic_corrections().is_empty());
    }
}
