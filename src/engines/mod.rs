pub mod nameres;
pub mod sapbert;

use anyhow::Result;
use tracing::info;

use crate::cli::{EngineArgs, EngineKind};
use crate::http::HttpSession;
use crate::model::Annotation;

use self::nameres::NameResEngine;
use self::sapbert::SapbertEngine;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotateProps {
    pub biolink_type: String,
    pub skip_umls: bool,
}

impl AnnotateProps {
    pub fn new(biolink_type: &str, skip_umls: bool) -> Self {
        Self {
            biolink_type: biolink_type.to_string(),
            skip_umls,
        }
    }
}

pub trait NerEngine {
    fn name(&self) -> &'static str;

    fn annotate(&self, text: &str, props: &AnnotateProps, limit: usize) -> Result<Vec<Annotation>>;
}

pub fn selected_engines(requested: &[EngineKind]) -> Vec<EngineKind> {
    if requested.is_empty() {
        return vec![EngineKind::Nameres, EngineKind::Sapbert];
    }

    let mut engines = Vec::with_capacity(requested.len());
    for kind in requested {
        if !engines.contains(kind) {
            engines.push(*kind);
        }
    }
    engines
}

pub fn build_engines(args: &EngineArgs, session: &HttpSession) -> Result<Vec<Box<dyn NerEngine>>> {
    let mut engines: Vec<Box<dyn NerEngine>> = Vec::new();
    for kind in selected_engines(&args.engines) {
        let engine: Box<dyn NerEngine> = match kind {
            EngineKind::Nameres => Box::new(NameResEngine::new(
                session.clone(),
                &args.nameres_endpoint,
            )?),
            EngineKind::Sapbert => Box::new(SapbertEngine::new(
                session.clone(),
                &args.sapbert_url,
                args.sapbert_count,
            )?),
        };
        info!(engine = engine.name(), "engine configured");
        engines.push(engine);
    }
    Ok(engines)
}
