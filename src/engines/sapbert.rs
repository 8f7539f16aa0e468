use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{AnnotateProps, NerEngine};
use crate::biolink::ensure_biolink_prefix;
use crate::http::HttpSession;
use crate::model::Annotation;

pub const DEFAULT_SAPBERT_URL: &str = "https://sap-qdrant.apps.renci.org/";
pub const DEFAULT_SAPBERT_COUNT: usize = 1000;
const SAPBERT_MODEL_NAME: &str = "sapbert";
const ANNOTATE_PATH: &str = "/annotate/";

#[derive(Debug, Serialize, PartialEq)]
struct AnnotateRequest<'a> {
    text: &'a str,
    model_name: &'a str,
    count: usize,
    args: AnnotateRequestArgs,
}

#[derive(Debug, Serialize, PartialEq)]
struct AnnotateRequestArgs {
    bl_type: String,
}

#[derive(Debug, Deserialize)]
struct AnnotateResult {
    #[serde(default)]
    curie: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

pub struct SapbertEngine {
    session: HttpSession,
    endpoint: Url,
    count: usize,
}

impl SapbertEngine {
    pub fn new(session: HttpSession, base_url: &str, count: usize) -> Result<Self> {
        Ok(Self {
            session,
            endpoint: annotate_endpoint(base_url)?,
            count,
        })
    }
}

impl NerEngine for SapbertEngine {
    fn name(&self) -> &'static str {
        "sapbert"
    }

    fn annotate(&self, text: &str, props: &AnnotateProps, limit: usize) -> Result<Vec<Annotation>> {
        let request = build_request(text, props, limit, self.count);
        debug!(text, count = request.count, bl_type = %request.args.bl_type, "SAPBERT request");

        let response = self
            .session
            .send(|client| client.post(self.endpoint.clone()).json(&request))
            .with_context(|| format!("could not contact SAPBERT for '{text}'"))?;

        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("failed to read SAPBERT response for '{text}'"))?;
        debug!(text, status = status.as_u16(), body = %body, "SAPBERT response");
        if !status.is_success() {
            bail!("SAPBERT returned HTTP {status} for '{text}'");
        }

        parse_annotate_response(text, &body)
    }
}

fn annotate_endpoint(base_url: &str) -> Result<Url> {
    let base = Url::parse(base_url).with_context(|| format!("invalid SAPBERT URL: {base_url}"))?;
    base.join(ANNOTATE_PATH)
        .with_context(|| format!("failed to build SAPBERT annotate URL from {base_url}"))
}

fn build_request<'a>(
    text: &'a str,
    props: &AnnotateProps,
    limit: usize,
    min_count: usize,
) -> AnnotateRequest<'a> {
    AnnotateRequest {
        text,
        model_name: SAPBERT_MODEL_NAME,
        count: limit.max(min_count),
        args: AnnotateRequestArgs {
            bl_type: ensure_biolink_prefix(&props.biolink_type),
        },
    }
}

fn parse_annotate_response(text: &str, body: &str) -> Result<Vec<Annotation>> {
    let results: Vec<AnnotateResult> = serde_json::from_str(body)
        .with_context(|| format!("failed to parse SAPBERT response for '{text}'"))?;

    Ok(results
        .into_iter()
        .map(|result| {
            let mut annotation = Annotation::for_whole_text(
                text,
                result.curie.unwrap_or_default(),
                result.name.unwrap_or_default(),
                String::new(),
            );
            annotation.score = result.score;
            annotation
        })
        .collect())
}
