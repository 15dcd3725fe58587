//! Drives one outbound buy call end to end against a canned language
//! model, printing every scripted utterance. Run with
//! `cargo run --example scripted_call`.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use callscript_agent::{
    decide, function_schema, outbound_buy_script, outbound_buy_state, LlmClient,
    OutboundBuyPolicy, ResponseValidator, SchemaMode,
};
use callscript_core::{AppConfig, FieldValue, LoadOptions, RawUpdate, EXIT_LOCATION};
use chrono::{Local, NaiveDate, NaiveTime};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Replays a fixed sequence of extraction results, standing in for the
/// real model.
struct CannedModel {
    turns: Mutex<VecDeque<RawUpdate>>,
}

impl CannedModel {
    fn new(turns: Vec<RawUpdate>) -> Self {
        Self { turns: Mutex::new(turns.into()) }
    }
}

#[async_trait]
impl LlmClient for CannedModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok("Dobrý den, tady Klára z AAA AUTO. Máte minutku?".to_string())
    }

    async fn extract(
        &self,
        _prompt: &str,
        _schema: &callscript_agent::FunctionSchema,
    ) -> Result<RawUpdate> {
        let mut turns = self.turns.lock().map_err(|_| anyhow::anyhow!("turn queue poisoned"))?;
        turns.pop_front().context("the canned call ran out of turns")
    }
}

fn turn(pairs: &[(&str, serde_json::Value)]) -> RawUpdate {
    pairs.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let now = Local::now();
    let today: NaiveDate = now.date_naive();
    let time: NaiveTime = now.time();
    let tomorrow = today.succ_opt().context("date overflow")?.format("%Y-%m-%d").to_string();

    let script = outbound_buy_script(today, time)?;
    let policy = OutboundBuyPolicy;
    let validator = ResponseValidator::standard(config.script.max_response_chars, ["jako AI"]);

    let mut state = outbound_buy_state(&script.schema, today, time);
    state.set("user_first_name", FieldValue::Text("Petr".to_string()));
    state.set("user_last_name", FieldValue::Text("Novák".to_string()));
    state.set("user_salutation", FieldValue::Text("pane Nováku".to_string()));
    state.set("branch_location", FieldValue::Text("Praha".to_string()));
    state.set("car_model_name", FieldValue::Text("Škoda Octavia".to_string()));
    state.set("car_manufacture_year", FieldValue::Integer(2018));
    state.set("car_fuel", FieldValue::Text("diesel".to_string()));
    state.set("our_price_offer", FieldValue::Integer(185_000));

    let model = CannedModel::new(vec![
        turn(&[("INTENT", json!("user_is_available_for_call"))]),
        turn(&[("INTENT", json!("user_answered_the_question")), ("car_transmission", json!("manuál"))]),
        turn(&[("INTENT", json!("user_answered_the_question")), ("car_body", json!("kombi"))]),
        // spoken-form mileage fails validation and takes the
        // normalization round trip
        turn(&[("INTENT", json!("user_answered_the_question")), ("car_mileage", json!("sto dvacet tisíc"))]),
        turn(&[("car_mileage", json!(120_000))]),
        turn(&[("INTENT", json!("user_answered_the_question")), ("users_car_price", json!(250_000))]),
        turn(&[("INTENT", json!("user_accepts"))]),
        turn(&[
            ("INTENT", json!("user_agreed_to_arrive_soon")),
            ("inspection_appointment_date", json!(tomorrow)),
            ("inspection_appointment_time", json!("18:00")),
        ]),
        turn(&[("INTENT", json!("user_accepts"))]),
        turn(&[("INTENT", json!("user_confirms"))]),
    ]);

    let opening = model.complete(&script.render_generation_prompt(&state)?).await?;
    println!("agent: {opening}");

    while state.script_location() != EXIT_LOCATION {
        let (prompt, function) = script.render_extraction_prompt(&state)?;
        let update = model.extract(&prompt, &function).await?;
        let mut decision = decide(&script, &policy, &mut state, &update);

        if decision.normalize {
            info!(fields = ?decision.fields_to_normalize, "normalizing failed values");
            let fields: BTreeSet<String> =
                decision.fields_to_normalize.iter().cloned().collect();
            let prompt = script.render_normalization_prompt(&state, &decision.fields_to_normalize)?;
            let schema = script.schema.restricted_to(&fields);
            let normalized =
                model.extract(&prompt, &function_schema(&schema, SchemaMode::Extraction)).await?;

            let mut merged = update.clone();
            merged.extend(normalized);
            decision = decide(&script, &policy, &mut state, &merged);
            if decision.normalize {
                bail!("normalization did not converge for {:?}", decision.fields_to_normalize);
            }
        }

        match decision.forced_utterance {
            Some(utterance) => {
                if let Err(reason) = validator.validate(&utterance) {
                    warn!(%reason, "scripted utterance failed validation");
                }
                println!("agent: {utterance}");
            }
            None => info!(
                location = state.script_location(),
                intent = state.intent().unwrap_or("-"),
                retry = decision.retry,
                "free-form turn"
            ),
        }
    }

    println!("call finished");
    Ok(())
}
