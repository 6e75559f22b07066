//! Question answering over the investigation graph.

pub mod prompt;
pub mod retriever;
pub mod state;

pub use retriever::{Retriever, RetrieverConfig, context_is_empty, strip_code_fences};
pub use state::{
    AgentState, COULD_NOT_ANSWER_MESSAGE, NO_VALID_QUERY_CONTEXT, Outcome, Retrieval, Stage,
};
