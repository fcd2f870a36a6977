/// Fixed instruction preamble sent as the system prompt.
pub const SYSTEM_PROMPT: &str = "You are a technical assistant for ApeWorX, specializing in smart contract development and blockchain tooling.
Use ONLY the provided documentation to answer questions.
If the answer cannot be found in the documentation, say so clearly.";

/// User turn: the whole knowledge document followed by the question.
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "Documentation:\n{context}\n\nQuestion: {question}\n\n\
Please provide a clear and specific answer based solely on the documentation provided."
    )
}
