//! Prompt assembly for the retrieval pipeline.
//!
//! All three stages render their schema sections from [`extract::schema`],
//! the same definitions the extraction prompt uses, so queries are written
//! against exactly the vocabulary the graph was built with.

use extract::schema::{NodeLabel, PROPERTY_KEYS, RELATIONSHIP_TYPES};

fn label_list() -> String {
    NodeLabel::ALL
        .iter()
        .map(|label| label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn relationship_list() -> String {
    RELATIONSHIP_TYPES.join(", ")
}

fn relationship_alternation() -> String {
    RELATIONSHIP_TYPES.join("|")
}

fn property_list() -> String {
    PROPERTY_KEYS.join(", ")
}

fn schema_section() -> String {
    format!(
        "GRAPH SCHEMA:\n\
         - Every node carries the label Entity plus one of: {labels}.\n\
         - Relationship types: {relationships} (free UPPER_SNAKE_CASE types may also occur).\n\
         - Node properties: {properties}. Relationships carry a details property.\n\
         - The id is \"name_context\" lowercased with underscores, e.g. \"budi_santoso_direktur\".",
        labels = label_list(),
        relationships = relationship_list(),
        properties = property_list(),
    )
}

/// System prompt for the planning stage: restate the question as an explicit
/// description of the graph lookup.
pub fn planning_system_prompt() -> String {
    format!(
        r#"You are an elite forensic investigator and a Neo4j Cypher expert.
Task: restate the user's question as one explicit instruction for the query writer, naming the entities, labels, and relationships involved.

{schema}

RULES (MANDATORY):
1. Be explicit enough that the query writer never has to guess. Example: "Find the Person node whose name contains 'John Doe' and return all of its direct relationships with the connected nodes."
2. Multi-part addresses stay one literal string: "SCBD Tower 2 unit 501 in Jakarta" becomes "SCBD Tower 2, Unit 501, Jakarta", never separate filters.
3. When unsure of the exact id, direct the writer to match the name property with CONTAINS.
4. Never introduce labels outside the schema. There is no City, Email, or Bank label.
5. Write proper nouns in Title Case: "john doe" becomes "John Doe".
6. Respond with the instruction only."#,
        schema = schema_section(),
    )
}

/// System prompt for the query-writing stage: one Cypher statement, nothing
/// else.
pub fn cypher_system_prompt() -> String {
    let alternation = relationship_alternation();
    format!(
        r#"You are an elite forensic investigator and a Neo4j Cypher expert.
Task: turn the instruction into a single Cypher query that retrieves the evidence.

{schema}

EXAMPLES:
Instruction: find who owns or directs Blue Ocean Holdings Ltd and how the owner is connected onward.
Query: MATCH (c:Company) WHERE c.name CONTAINS "Blue Ocean Holdings" MATCH (owner:Person)-[:DIRECTOR_OF]->(c) OPTIONAL MATCH (owner)-[r]-(connected) RETURN owner, r, connected

Instruction: find how Linda Wijaya and John Doe are connected, within three hops.
Query: MATCH (a:Person) WHERE a.name CONTAINS "Linda Wijaya" MATCH (b:Person) WHERE b.name CONTAINS "John Doe" MATCH p = (a)-[:{alternation}*1..3]-(b) RETURN p

Instruction: find companies located at the address where John Doe resides.
Query: MATCH (p:Person) WHERE p.name CONTAINS "John Doe" MATCH (p)-[:RESIDES_AT]->(addr:Address)<-[:LOCATED_AT|REGISTERED_AT]-(c:Company) RETURN p, addr, c

Instruction: find every direct relationship of John Doe.
Query: MATCH (p:Person) WHERE p.name CONTAINS "John Doe" MATCH (p)-[r]-(connected) RETURN p, r, connected

RULES (MANDATORY):
1. Return ONLY the raw Cypher query. No explanations, no markdown fences, no comments.
2. Filter on the name property with CONTAINS unless the full id is certain.
3. Write proper nouns in Title Case inside string literals.
4. The query must only read. Never CREATE, MERGE, SET, or DELETE."#,
        schema = schema_section(),
    )
}

/// System prompt for the answer stage.
pub fn answer_system_prompt() -> String {
    r#"You are an investigative analyst reporting on graph query results.
Answer the user's question formally and completely, using only the graph data provided.
Surface every property present in the data: names, contexts, relationship details, amounts, dates. Do not stop at entity names.
If the data is empty or reports a failure, state plainly that the graph holds no evidence for the question."#
        .to_string()
}

pub fn planning_content(question: &str) -> String {
    format!("Question: {question}")
}

pub fn cypher_content(decomposition: &str, rewrite: bool) -> String {
    if rewrite {
        format!(
            "Instruction: {decomposition}\n\nThe previous query returned no rows. Write a different query that broadens the search, for example by matching on shorter name fragments or removing optional constraints."
        )
    } else {
        format!("Instruction: {decomposition}")
    }
}

pub fn answer_content(question: &str, graph_context: &str) -> String {
    format!("Question: {question}\nGraph data: {graph_context}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_prompts_share_the_schema_vocabulary() {
        for prompt in [planning_system_prompt(), cypher_system_prompt()] {
            assert!(prompt.contains("Person, Company, Address, Document"));
            assert!(prompt.contains("TRANSFERRED_TO"));
            assert!(prompt.contains(&format!("Node properties: {}.", PROPERTY_KEYS.join(", "))));
        }
    }

    #[test]
    fn cypher_examples_use_the_canonical_alternation() {
        let prompt = cypher_system_prompt();
        assert!(prompt.contains("RESIDES_AT|SPOUSE|"));
        assert!(prompt.contains("*1..3"));
    }

    #[test]
    fn rewrite_content_nudges_for_a_different_query() {
        let initial = cypher_content("find X", false);
        let rewrite = cypher_content("find X", true);
        assert!(!initial.contains("previous query"));
        assert!(rewrite.contains("previous query"));
    }
}
