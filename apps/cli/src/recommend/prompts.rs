// All LLM prompt constants for the recommendation flow.
// Placeholders in `{braces}` are replaced before sending.

/// System prompt for sub-question decomposition — enforces JSON-only output.
pub const DECOMPOSE_SYSTEM: &str = "You are a careful research planner. \
    Split a compound question into smaller sub-questions, each answerable \
    by exactly one of the provided data sources. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON array. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Decomposition prompt. Replace `{tools}` and `{question}` before sending.
pub const DECOMPOSE_PROMPT_TEMPLATE: &str = r#"Available data sources:
{tools}

Split the following question into 2-5 sub-questions. Each sub-question must
be self-contained and routed to the single data source best able to answer
it, referenced by its exact name.

Question: {question}

Return a JSON array with this EXACT schema (no extra fields):
[
  {"tool": "CV", "question": "What skills does the candidate currently have?"}
]"#;

/// System prompt for answering one sub-question from retrieved context.
pub const ANSWER_SYSTEM: &str = "You are a precise analyst. \
    Answer the question using ONLY the provided context passages. \
    If the context does not contain the answer, say so plainly. \
    Do NOT invent details.";

/// Per-tool answer prompt. Replace `{context}` and `{question}`.
pub const ANSWER_PROMPT_TEMPLATE: &str = r#"Context passages:
{context}

Question: {question}

Answer concisely, citing only facts present in the context."#;

/// System prompt for the final synthesis step.
pub const SYNTHESIZE_SYSTEM: &str = "You are a career advisor. \
    Combine the sub-question findings into one clear, actionable \
    recommendation. Write plain prose, no markdown headings.";

/// Synthesis prompt. Replace `{question}` and `{findings}`.
pub const SYNTHESIZE_PROMPT_TEMPLATE: &str = r#"Original question: {question}

Findings from the data sources:
{findings}

Write the final answer: list the concrete skills and experience the person
is missing for the target role and how to acquire them, grounded in the
findings above."#;
