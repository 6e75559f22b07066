use serde::Serialize;

/// Context written by the run stage when there was no valid query to send to
/// the graph. The answer stage reads it like any other context.
pub const NO_VALID_QUERY_CONTEXT: &str = "No valid query was available to run.";

/// Terminal answer when the rewrite budget runs out without usable context.
pub const COULD_NOT_ANSWER_MESSAGE: &str =
    "The graph holds no evidence that answers this question.";

/// Shared state threaded through the pipeline. Each field is written by
/// exactly one stage and read by later ones.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    pub question: String,
    /// Written by [`Stage::Planning`].
    pub query_decomposition: Option<String>,
    /// Written by [`Stage::WriteQuery`].
    pub cypher_query: Option<String>,
    /// Written by [`Stage::RunQuery`].
    pub graph_context: Option<String>,
    /// Written by [`Stage::AnswerUser`].
    pub answer: Option<String>,
}

impl AgentState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            query_decomposition: None,
            cypher_query: None,
            graph_context: None,
            answer: None,
        }
    }
}

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planning,
    WriteQuery,
    RunQuery,
    AnswerUser,
}

/// How a retrieval run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Answered,
    CouldNotAnswer,
}

/// Final result of a retrieval run: the outcome plus the full state for
/// callers that want the intermediate artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub outcome: Outcome,
    pub rewrites: usize,
    pub state: AgentState,
}

impl Retrieval {
    /// The user-facing answer, regardless of outcome.
    pub fn answer_text(&self) -> &str {
        match self.state.answer.as_deref() {
            Some(answer) => answer,
            None => COULD_NOT_ANSWER_MESSAGE,
        }
    }
}
