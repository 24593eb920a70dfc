pub mod language_detector;
pub mod router;
pub mod term_normalizer;
pub mod thanglish;

pub use language_detector::LanguageDetector;
pub use router::{Route, RouteConfig, Router, RouterDecision};
pub use term_normalizer::{
    canonicalize_dose, canonicalize_frequency, canonicalize_unit, AnatomyAnnotation, TermNormalizer,
};
pub use thanglish::ThanglishNormalizer;
