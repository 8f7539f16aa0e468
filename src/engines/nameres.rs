use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{AnnotateProps, NerEngine};
use crate::http::HttpSession;
use crate::model::Annotation;

pub const DEFAULT_NAMERES_ENDPOINT: &str = "https://name-resolution-sri-dev.apps.renci.org/lookup";
const DEFAULT_RESULT_TYPE: &str = "biolink:NamedThing";
const UMLS_PREFIX: &str = "UMLS";

#[derive(Debug, Deserialize)]
struct LookupResult {
    #[serde(default)]
    curie: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    clique_identifier_count: Option<u64>,
}

pub struct NameResEngine {
    session: HttpSession,
    endpoint: Url,
}

impl NameResEngine {
    pub fn new(session: HttpSession, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid NameRes endpoint: {endpoint}"))?;
        Ok(Self { session, endpoint })
    }
}

impl NerEngine for NameResEngine {
    fn name(&self) -> &'static str {
        "nameres"
    }

    fn annotate(&self, text: &str, props: &AnnotateProps, limit: usize) -> Result<Vec<Annotation>> {
        let params = lookup_params(text, props, limit);
        let response = self
            .session
            .send(|client| client.get(self.endpoint.clone()).query(&params))
            .with_context(|| format!("could not contact NameRes for '{text}'"))?;

        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("failed to read NameRes response for '{text}'"))?;
        debug!(text, status = status.as_u16(), body = %body, "NameRes response");
        if !status.is_success() {
            bail!("NameRes returned HTTP {status} for '{text}'");
        }

        parse_lookup_response(text, &body)
    }
}

fn lookup_params(text: &str, props: &AnnotateProps, limit: usize) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("autocomplete", "false".to_string()),
        ("offset", "0".to_string()),
        ("limit", limit.to_string()),
        ("string", text.to_string()),
        ("biolink_type", props.biolink_type.clone()),
    ];
    if props.skip_umls {
        params.push(("exclude_prefixes", UMLS_PREFIX.to_string()));
    }
    params
}

fn parse_lookup_response(text: &str, body: &str) -> Result<Vec<Annotation>> {
    let results: Vec<LookupResult> = serde_json::from_str(body)
        .with_context(|| format!("failed to parse NameRes response for '{text}'"))?;

    Ok(results
        .into_iter()
        .map(|result| {
            let biolink_type = result
                .types
                .into_iter()
                .next()
                .unwrap_or_else(|| DEFAULT_RESULT_TYPE.to_string());
            let mut annotation = Annotation::for_whole_text(
                text,
                result.curie.unwrap_or_default(),
                result.label.unwrap_or_default(),
                biolink_type,
            );
            annotation.score = result.score;
            annotation.clique_identifier_count = result.clique_identifier_count;
            annotation
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{AnnotateProps, NameResEngine, NerEngine, lookup_params, parse_lookup_response};
    use crate::http::testing::{CannedServer, session};

    #[test]
    fn lookup_params_include_filters() {
        let props = AnnotateProps::new("biolink:Disease", false);
        let params = lookup_params("asthma", &props, 10);
        assert!(params.contains(&("autocomplete", "false".to_string())));
        assert!(params.contains(&("limit", "10".to_string())));
        assert!(params.contains(&("string", "asthma".to_string())));
        assert!(params.contains(&("biolink_type", "biolink:Disease".to_string())));
        assert!(params.iter().all(|(key, _)| *key != "exclude_prefixes"));
    }

    #[test]
    fn skip_umls_excludes_the_prefix() {
        let props = AnnotateProps::new("", true);
        let params = lookup_params("asthma", &props, 5);
        assert!(params.contains(&("exclude_prefixes", "UMLS".to_string())));
    }

    #[test]
    fn parse_maps_first_type_and_defaults_missing_fields() {
        let body = r#"[
            {"curie": "UBERON:0002113", "label": "kidney", "types": ["biolink:GrossAnatomicalStructure", "biolink:AnatomicalEntity"], "score": 412.5, "clique_identifier_count": 7},
            {"curie": "UMLS:C0022646", "label": null, "types": [], "score": 3}
        ]"#;
        let annotations = parse_lookup_response("kidney", body).expect("body should parse");

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].id, "UBERON:0002113");
        assert_eq!(annotations[0].biolink_type, "biolink:GrossAnatomicalStructure");
        assert_eq!(annotations[0].score, Some(412.5));
        assert_eq!(annotations[0].clique_identifier_count, Some(7));
        assert_eq!(annotations[0].span.end, 6);
        assert_eq!(annotations[1].label, "");
        assert_eq!(annotations[1].biolink_type, "biolink:NamedThing");
        assert_eq!(annotations[1].score, Some(3.0));
    }

    #[test]
    fn parse_rejects_non_list_bodies() {
        assert!(parse_lookup_response("kidney", r#"{"detail": "oops"}"#).is_err());
    }

    #[test]
    fn annotate_fails_on_server_error() {
        let server = CannedServer::spawn("500 Internal Server Error", r#"{"detail": "boom"}"#);
        let engine = NameResEngine::new(session(0), &format!("{}lookup", server.url))
            .expect("endpoint parses");
        let result = engine.annotate("kidney", &AnnotateProps::default(), 10);
        assert!(result.is_err());
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn annotate_parses_successful_lookup() {
        let server = CannedServer::spawn(
            "200 OK",
            r#"[{"curie": "UBERON:0002113", "label": "kidney", "types": ["biolink:AnatomicalEntity"], "score": 10.5}]"#,
        );
        let engine = NameResEngine::new(session(0), &format!("{}lookup", server.url))
            .expect("endpoint parses");
        let annotations = engine
            .annotate("kidney", &AnnotateProps::new("biolink:AnatomicalEntity", true), 10)
            .expect("lookup succeeds");
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].id, "UBERON:0002113");
    }
}
