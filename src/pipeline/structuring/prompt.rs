use crate::pipeline::schema::TargetSchema;

pub const STRUCTURING_SYSTEM_PROMPT: &str = r#"
You are a data extraction assistant that turns unstructured product evidence into a
single JSON object for a product catalogue table.

RULES (ABSOLUTE, NO EXCEPTIONS):
1. Output ONLY the JSON object. No explanation before or after it.
2. Do NOT wrap the output in ``` fences or any other markup.
3. Use ONLY the fields listed in the request. Never invent new keys.
4. If a field is uncertain or missing, output null for that field.
"#;

/// Build the structuring prompt for the raw evidence gathered so far.
pub fn build_structuring_prompt(raw_text: &str, schema: &TargetSchema) -> String {
    format!(
        r#"Extract structured product data from the raw OCR, barcode and product lookup text below.

<evidence>
{raw_text}
</evidence>

Return a valid JSON object with exactly these fields:
{fields}

Only fill in fields you are confident about. Use null for anything uncertain or missing.
If ingredients appear as a sentence, convert them into a list of strings.

Return ONLY the JSON object, with no surrounding text and no code fences."#,
        raw_text = raw_text.trim(),
        fields = schema.describe(),
    )
}
