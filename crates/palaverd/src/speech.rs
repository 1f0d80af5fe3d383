//! Demo speech backend.
//!
//! A self-contained provider used until a real synthesis engine is
//! attached: it advertises a `text_to_speech` capability and a voice
//! catalog resource, and feeds outcome telemetry into the sampling
//! controller like a real backend would.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use palaver::provider::{register_provider, CapabilityProvider, CapabilitySpec, ExecutionOutput};
use palaver::resources::{Method, ResourceProvider, UriTemplate};
use palaver::sampling::SamplingController;
use palaver::transport::GatewayContext;
use palaver::GatewayError;

const VOICES: &[(&str, &[&str])] = &[
    ("en-us", &["aria", "banjo"]),
    ("en-gb", &["clara"]),
    ("de-de", &["dieter"]),
];

struct SpeechProvider {
    sampling: Arc<SamplingController>,
}

#[async_trait]
impl CapabilityProvider for SpeechProvider {
    fn capabilities(&self) -> Vec<CapabilitySpec> {
        vec![
            CapabilitySpec {
                name: "text_to_speech".into(),
                kind: "synthesis".into(),
                description: "Synthesizes speech from text".into(),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" },
                        "voice": { "type": "string" },
                        "profile": { "type": "string" }
                    },
                    "required": ["text"]
                })),
                metadata: json!({ "demo": true }),
            },
            CapabilitySpec {
                name: "list_voices".into(),
                kind: "catalog".into(),
                description: "Lists available voices by language".into(),
                input_schema: None,
                metadata: json!({ "demo": true }),
            },
        ]
    }

    async fn execute(
        &self,
        capability: &str,
        params: Value,
    ) -> Result<ExecutionOutput, GatewayError> {
        match capability {
            "text_to_speech" => self.synthesize(params).await,
            "list_voices" => Ok(ExecutionOutput {
                result_id: new_result_id(),
                format: "json".into(),
                payload: json!({
                    "voices": VOICES
                        .iter()
                        .map(|(lang, names)| json!({ "lang": lang, "names": names }))
                        .collect::<Vec<_>>()
                }),
            }),
            other => Err(GatewayError::tool_not_found(other)),
        }
    }
}

impl SpeechProvider {
    async fn synthesize(&self, params: Value) -> Result<ExecutionOutput, GatewayError> {
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Validation("text is required".into()))?;
        let profile = params
            .get("profile")
            .and_then(Value::as_str)
            .unwrap_or("adaptive");
        let voice = params
            .get("voice")
            .and_then(Value::as_str)
            .unwrap_or("aria");

        let tuned = self.sampling.params_for(profile);
        let started = Instant::now();

        // Stand-in for the synthesis call: deterministic sizing from
        // the input text.
        let sample_count = text.len() as u64 * 160;
        let output = ExecutionOutput {
            result_id: new_result_id(),
            format: "audio/wav".into(),
            payload: json!({
                "voice": voice,
                "samples": sample_count,
                "temperature": tuned.temperature,
                "top_p": tuned.top_p,
            }),
        };

        self.sampling.record_outcome(
            profile,
            started.elapsed().as_secs_f64() * 1000.0,
            text.len() as u32,
            true,
        );
        Ok(output)
    }
}

fn new_result_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

struct VoiceCatalog;

#[async_trait]
impl ResourceProvider for VoiceCatalog {
    async fn fetch(
        &self,
        _method: Method,
        params: BTreeMap<String, String>,
        _body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        let lang = params
            .get("lang")
            .ok_or_else(|| GatewayError::Validation("lang is required".into()))?;
        let names = VOICES
            .iter()
            .find(|(l, _)| l == lang)
            .map(|(_, names)| *names)
            .ok_or_else(|| GatewayError::NotFound(format!("No voices for {}", lang)))?;
        Ok(json!({ "lang": lang, "names": names }))
    }
}

/// Wire the demo backend into a gateway context.
pub fn install(ctx: &GatewayContext) -> Result<(), GatewayError> {
    register_provider(
        &ctx.registry,
        Arc::new(SpeechProvider {
            sampling: ctx.sampling.clone(),
        }),
    );

    let template = UriTemplate::with_constraints(
        "/voices/{lang}",
        &[("lang".to_string(), "[a-z-]+".to_string())]
            .into_iter()
            .collect(),
    )?;
    ctx.router.register(template, [Method::Get], Arc::new(VoiceCatalog));
    Ok(())
}
