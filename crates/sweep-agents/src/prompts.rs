use serde_json::{json, Value};
use sweep_models::AnalysisRequest;

pub const ANALYSIS_SYSTEM_PROMPT: &str = "\
You are an options market-structure analyst. You receive option-chain tables \
(strike, type, implied volatility, open interest, volume) for one or more \
expiries, sometimes with precomputed gamma levels. Identify the strikes that \
are likely to act as support, resistance or magnets for price, and summarize \
the positioning. Respond with a single JSON object that follows the requested \
schema. Do not wrap it in markdown.";

pub const CHAT_SYSTEM_PROMPT: &str = "\
You are an options market-structure analyst continuing a conversation about \
option-chain data the user already shared. Answer concisely in plain text. \
When you cite a level, give the strike and the reason.";

/// Returned by chat when the model produced no text.
pub const CHAT_FALLBACK: &str = "No response received.";

/// User prompt embedding every dataset, labeled by its type.
pub fn build_analysis_prompt(request: &AnalysisRequest) -> String {
    let spot = request
        .spot_price
        .filter(|s| s.is_finite())
        .map_or_else(|| "unknown".to_string(), |s| format!("{s:.2}"));

    let mut prompt = format!(
        "Analyze the following option-chain datasets.\nSPOT PRICE: {spot}\n"
    );
    for (index, dataset) in request.datasets.iter().enumerate() {
        prompt.push_str(&format!(
            "\n--- DATASET {} [{}] {} ---\n{}\n",
            index + 1,
            dataset.kind,
            dataset.name,
            dataset.content.trim_end()
        ));
    }
    prompt.push_str(
        "\nReturn JSON with `outlook` (short directional bias), `levels` \
         (array of {price, kind, strength, note}) and `summary`.",
    );
    prompt
}

/// Response schema in the OpenAPI subset accepted by Gemini.
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "outlook": {"type": "STRING"},
            "levels": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "price": {"type": "NUMBER"},
                        "kind": {"type": "STRING"},
                        "strength": {"type": "STRING"},
                        "note": {"type": "STRING"}
                    },
                    "required": ["price", "kind"]
                }
            },
            "summary": {"type": "STRING"}
        },
        "required": ["outlook", "levels"]
    })
}
