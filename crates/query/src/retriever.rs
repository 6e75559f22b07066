//! Four-stage retrieval over the investigation graph.
//!
//! planning -> write_query -> run_query -> answer_user, driven by an explicit
//! stage loop. The run stage is deliberately infallible: a failed or invalid
//! query becomes descriptive context for the answer stage instead of an
//! error, so the user always gets a response grounded in what actually
//! happened.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use extract::llm::Completions;
use graph::store::GraphStore;

use crate::prompt;
use crate::state::{
    AgentState, NO_VALID_QUERY_CONTEXT, Outcome, Retrieval, Stage,
};

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Route empty run-stage context back to the query writer instead of
    /// straight to the answer stage. Off by default.
    pub rewrite_on_empty: bool,
    /// Upper bound on rewrite round trips per question.
    pub max_query_rewrites: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            rewrite_on_empty: false,
            max_query_rewrites: 2,
        }
    }
}

pub struct Retriever<C, G> {
    completions: C,
    store: G,
    config: RetrieverConfig,
}

impl<C: Completions, G: GraphStore> Retriever<C, G> {
    pub fn new(completions: C, store: G, config: RetrieverConfig) -> Self {
        Self {
            completions,
            store,
            config,
        }
    }

    /// Run the full pipeline for one question.
    pub async fn answer_question(&self, question: &str) -> Result<Retrieval> {
        let mut state = AgentState::new(question);
        let mut rewrites = 0;
        let mut stage = Stage::Planning;
        loop {
            match stage {
                Stage::Planning => {
                    state = self.plan(state).await?;
                    stage = Stage::WriteQuery;
                }
                Stage::WriteQuery => {
                    state = self.write_query(state, rewrites > 0).await?;
                    stage = Stage::RunQuery;
                }
                Stage::RunQuery => {
                    state = self.run_query(state).await;
                    stage = Stage::AnswerUser;
                    if self.config.rewrite_on_empty && self.context_is_empty(&state) {
                        if rewrites < self.config.max_query_rewrites {
                            rewrites += 1;
                            info!(rewrites, "graph context is empty, rewriting the query");
                            stage = Stage::WriteQuery;
                        } else {
                            warn!(
                                max_query_rewrites = self.config.max_query_rewrites,
                                "rewrite budget exhausted without usable context",
                            );
                            return Ok(Retrieval {
                                outcome: Outcome::CouldNotAnswer,
                                rewrites,
                                state,
                            });
                        }
                    }
                }
                Stage::AnswerUser => {
                    state = self.answer(state).await?;
                    return Ok(Retrieval {
                        outcome: Outcome::Answered,
                        rewrites,
                        state,
                    });
                }
            }
        }
    }

    async fn plan(&self, mut state: AgentState) -> Result<AgentState> {
        let decomposition = self
            .completions
            .complete(
                &prompt::planning_system_prompt(),
                &prompt::planning_content(&state.question),
            )
            .await
            .context("planning stage failed")?;
        debug!(%decomposition, "planning stage completed");
        state.query_decomposition = Some(decomposition);
        Ok(state)
    }

    async fn write_query(&self, mut state: AgentState, rewrite: bool) -> Result<AgentState> {
        let content = {
            let decomposition = state
                .query_decomposition
                .as_deref()
                .context("write_query stage ran before planning")?;
            prompt::cypher_content(decomposition, rewrite)
        };
        let raw = self
            .completions
            .complete(&prompt::cypher_system_prompt(), &content)
            .await
            .context("query writing stage failed")?;
        let cypher = strip_code_fences(&raw);
        debug!(%cypher, "query writing stage completed");
        state.cypher_query = Some(cypher);
        Ok(state)
    }

    /// Never fails: whatever happens at the store is folded into
    /// `graph_context` so the answer stage can report it.
    async fn run_query(&self, mut state: AgentState) -> AgentState {
        let query = state.cypher_query.clone().unwrap_or_default();
        let query = query.trim();
        if query.is_empty() || query.contains("Error") {
            warn!("no valid query to run against the graph");
            state.graph_context = Some(NO_VALID_QUERY_CONTEXT.to_string());
            return state;
        }
        match self.store.run_read(query).await {
            Ok(rows) => {
                info!(rows = rows.len(), "generated query executed");
                state.graph_context = Some(
                    serde_json::to_string(&rows)
                        .unwrap_or_else(|e| format!("Failed to serialize graph rows: {e}")),
                );
            }
            Err(e) => {
                error!(error = %e, "generated query failed");
                state.graph_context = Some(format!("Failed to fetch data from the graph: {e}"));
            }
        }
        state
    }

    async fn answer(&self, mut state: AgentState) -> Result<AgentState> {
        let content = {
            let graph_context = state
                .graph_context
                .as_deref()
                .context("answer stage ran before the run stage")?;
            prompt::answer_content(&state.question, graph_context)
        };
        let answer = self
            .completions
            .complete(&prompt::answer_system_prompt(), &content)
            .await
            .context("answer stage failed")?;
        state.answer = Some(answer);
        Ok(state)
    }

    fn context_is_empty(&self, state: &AgentState) -> bool {
        state
            .graph_context
            .as_deref()
            .map(context_is_empty)
            .unwrap_or(true)
    }
}

/// Deterministic emptiness check on run-stage context. No model call is
/// involved in routing.
pub fn context_is_empty(context: &str) -> bool {
    let trimmed = context.trim();
    trimmed.is_empty()
        || trimmed == "[]"
        || trimmed == NO_VALID_QUERY_CONTEXT
        || trimmed.starts_with("Failed to fetch data from the graph")
}

/// Remove a surrounding markdown fence and a leading `cypher` language tag.
/// Models add both despite instructions.
pub fn strip_code_fences(raw: &str) -> String {
    let mut body = raw.trim();
    if let Some(open) = body.find("```") {
        let after = &body[open + 3..];
        body = match after.find("```") {
            Some(close) => &after[..close],
            None => after,
        };
    }
    let body = body.trim_start();
    let body = body.strip_prefix("cypher").unwrap_or(body);
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    use serde_json::json;

    use extract::llm::LlmError;
    use extract::schema::Entity;
    use graph::store::GraphError;

    use crate::state::COULD_NOT_ANSWER_MESSAGE;

    use super::*;

    struct ScriptedCompletions {
        responses: Mutex<VecDeque<String>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedCompletions {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn next(&self, user: &str) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(user.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(LlmError::Empty)
        }
    }

    impl Completions for ScriptedCompletions {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            self.next(user)
        }

        async fn complete_json(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            self.next(user)
        }
    }

    enum ReadScript {
        Rows(Vec<serde_json::Value>),
        Fail,
    }

    struct ScriptedGraph {
        reads: Mutex<Vec<String>>,
        script: Mutex<VecDeque<ReadScript>>,
    }

    impl ScriptedGraph {
        fn new(script: Vec<ReadScript>) -> Self {
            Self {
                reads: Mutex::new(Vec::new()),
                script: Mutex::new(script.into()),
            }
        }

        fn read_count(&self) -> usize {
            self.reads.lock().unwrap().len()
        }
    }

    impl GraphStore for ScriptedGraph {
        async fn upsert_entity(&self, _entity: &Entity) -> Result<(), GraphError> {
            Ok(())
        }

        async fn existing_ids(&self, _ids: &[String]) -> Result<HashSet<String>, GraphError> {
            Ok(HashSet::new())
        }

        async fn create_relationship(
            &self,
            _source_id: &str,
            _rel_type: &str,
            _target_id: &str,
            _details: &str,
        ) -> Result<u64, GraphError> {
            Ok(1)
        }

        async fn run_read(&self, cypher: &str) -> Result<Vec<serde_json::Value>, GraphError> {
            self.reads.lock().unwrap().push(cypher.to_string());
            match self.script.lock().unwrap().pop_front() {
                Some(ReadScript::Rows(rows)) => Ok(rows),
                Some(ReadScript::Fail) => Err(GraphError::Query(
                    neo4rs::Error::UnsupportedVersion("read refused".to_string()),
                )),
                None => Ok(Vec::new()),
            }
        }
    }

    fn retriever(
        responses: &[&str],
        script: Vec<ReadScript>,
        config: RetrieverConfig,
    ) -> Retriever<ScriptedCompletions, ScriptedGraph> {
        Retriever::new(
            ScriptedCompletions::new(responses),
            ScriptedGraph::new(script),
            config,
        )
    }

    #[tokio::test]
    async fn stages_run_in_order_and_share_state() {
        let r = retriever(
            &[
                "Find the Person whose name contains 'Linda Wijaya' and return her relationships.",
                "```cypher\nMATCH (p:Person) WHERE p.name CONTAINS \"Linda Wijaya\" MATCH (p)-[r]-(c) RETURN p, r, c\n```",
                "Linda Wijaya directs CV Cahaya.",
            ],
            vec![ReadScript::Rows(vec![
                json!({"p": {"name": "Linda Wijaya"}, "c": {"name": "CV Cahaya"}}),
            ])],
            RetrieverConfig::default(),
        );

        let result = r.answer_question("Who does Linda Wijaya direct?").await.unwrap();

        assert_eq!(result.outcome, Outcome::Answered);
        assert_eq!(result.rewrites, 0);
        assert_eq!(result.answer_text(), "Linda Wijaya directs CV Cahaya.");

        let cypher = result.state.cypher_query.unwrap();
        assert!(!cypher.contains("```"));
        assert!(cypher.starts_with("MATCH"));
        assert!(result.state.graph_context.unwrap().contains("CV Cahaya"));

        let requests = r.completions.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("Question:"));
        assert!(requests[1].starts_with("Instruction:"));
        assert!(requests[2].contains("Graph data:"));
        assert_eq!(r.store.read_count(), 1);
    }

    #[tokio::test]
    async fn blank_query_skips_the_store_but_still_answers() {
        let r = retriever(
            &["decomposition", "``````", "There is no evidence to report."],
            vec![],
            RetrieverConfig::default(),
        );

        let result = r.answer_question("Anything on Ghost Corp?").await.unwrap();

        assert_eq!(r.store.read_count(), 0);
        assert_eq!(
            result.state.graph_context.as_deref(),
            Some(NO_VALID_QUERY_CONTEXT)
        );
        assert_eq!(result.outcome, Outcome::Answered);
        assert_eq!(r.completions.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn error_flagged_query_skips_the_store() {
        let r = retriever(
            &["decomposition", "Error: the question is out of schema", "No evidence."],
            vec![],
            RetrieverConfig::default(),
        );

        let result = r.answer_question("What is the weather?").await.unwrap();

        assert_eq!(r.store.read_count(), 0);
        assert_eq!(
            result.state.graph_context.as_deref(),
            Some(NO_VALID_QUERY_CONTEXT)
        );
    }

    #[tokio::test]
    async fn store_failure_becomes_descriptive_context() {
        let r = retriever(
            &["decomposition", "MATCH (n) RETURN n", "The lookup failed."],
            vec![ReadScript::Fail],
            RetrieverConfig::default(),
        );

        let result = r.answer_question("Who is John Doe?").await.unwrap();

        assert_eq!(result.outcome, Outcome::Answered);
        let context = result.state.graph_context.unwrap();
        assert!(context.starts_with("Failed to fetch data from the graph"));
        assert_eq!(r.completions.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_rows_answer_directly_when_rewrites_are_off() {
        let r = retriever(
            &["decomposition", "MATCH (n:Person) RETURN n", "Nothing in the graph."],
            vec![ReadScript::Rows(vec![])],
            RetrieverConfig::default(),
        );

        let result = r.answer_question("Who is nobody?").await.unwrap();

        assert_eq!(result.outcome, Outcome::Answered);
        assert_eq!(result.rewrites, 0);
        assert_eq!(result.state.graph_context.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn rewrite_budget_is_capped_and_ends_in_could_not_answer() {
        let config = RetrieverConfig {
            rewrite_on_empty: true,
            max_query_rewrites: 2,
        };
        let r = retriever(
            &[
                "decomposition",
                "MATCH (n:Person) WHERE n.name CONTAINS \"Nobody\" RETURN n",
                "MATCH (n:Person) WHERE n.name CONTAINS \"No\" RETURN n",
                "MATCH (n:Entity) RETURN n",
            ],
            vec![],
            config,
        );

        let result = r.answer_question("Who is nobody?").await.unwrap();

        assert_eq!(result.outcome, Outcome::CouldNotAnswer);
        assert_eq!(result.rewrites, 2);
        assert_eq!(result.answer_text(), COULD_NOT_ANSWER_MESSAGE);
        // planning once, query writing three times, no answer call
        assert_eq!(r.completions.requests.lock().unwrap().len(), 4);
        assert_eq!(r.store.read_count(), 3);
    }

    #[tokio::test]
    async fn rewrite_rounds_carry_the_nudge() {
        let config = RetrieverConfig {
            rewrite_on_empty: true,
            max_query_rewrites: 1,
        };
        let r = retriever(
            &[
                "decomposition",
                "MATCH (n:Person) RETURN n",
                "MATCH (n:Entity) RETURN n",
                "Found on the second try.",
            ],
            vec![
                ReadScript::Rows(vec![]),
                ReadScript::Rows(vec![json!({"n": {"name": "John Doe"}})]),
            ],
            config,
        );

        let result = r.answer_question("Who is John Doe?").await.unwrap();

        assert_eq!(result.outcome, Outcome::Answered);
        assert_eq!(result.rewrites, 1);
        let requests = r.completions.requests.lock().unwrap();
        assert!(!requests[1].contains("previous query"));
        assert!(requests[2].contains("previous query"));
    }

    #[test]
    fn fences_and_language_tags_are_stripped() {
        assert_eq!(
            strip_code_fences("```cypher\nMATCH (n) RETURN n\n```"),
            "MATCH (n) RETURN n"
        );
        assert_eq!(
            strip_code_fences("```\nMATCH (n) RETURN n\n```"),
            "MATCH (n) RETURN n"
        );
        assert_eq!(strip_code_fences("MATCH (n) RETURN n"), "MATCH (n) RETURN n");
        assert_eq!(strip_code_fences("```cypher\nMATCH (n) RETURN n"), "MATCH (n) RETURN n");
        assert_eq!(strip_code_fences("  \n"), "");
    }

    #[test]
    fn context_emptiness_is_deterministic() {
        assert!(context_is_empty(""));
        assert!(context_is_empty("[]"));
        assert!(context_is_empty(NO_VALID_QUERY_CONTEXT));
        assert!(context_is_empty("Failed to fetch data from the graph: timeout"));
        assert!(!context_is_empty(r#"[{"name": "Linda"}]"#));
    }
}
