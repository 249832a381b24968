//! The ATS tool catalogue.
//!
//! Built once per process and shared read-only by every session.

use crate::pipeline::CreatePipelineTool;
use recruitr_core::tool::{ToolDescriptor, ToolRegistry};
use serde_json::json;
use std::sync::{Arc, LazyLock};

pub const GET_RECENT_PIPELINES: &str =
    "query GetPipelines{ Pipeline(order_by: {updated_at: desc}, limit: 10) { id name updated_at } }";

pub const GET_RECENTLY_FINISHED_CANDIDATES: &str = "query GetRecentlyFinishedCandidates($pipeline_id: uuid!, $limit: Int, $offset: Int) { Pipeline_by_pk(id: $pipeline_id) { Candidates(order_by: {created_at: desc}, limit:$limit, offset:$offset){ id name email created_at status resume_url total_score } } }";

pub const GET_TOP_CANDIDATES: &str = "query GetTopCandidates($pipeline_id: uuid!, $limit: Int = 10, $offset: Int = 0) { Pipeline_by_pk(id: $pipeline_id) { Candidates(order_by: {total_score: desc}, limit:$limit, offset:$offset){ id name email created_at status resume_url total_score } } }";

pub const GET_CANDIDATE_BY_EMAIL: &str = "query GetCandidateByEmail($email: String!) { Candidate(where: {email: {_eq: $email}}) { id name email pipeline_id total_score status resume_url} }";

pub const GET_CANDIDATE_BY_NAME: &str = "query GetCandidateByName($name: String!) { Candidate(where: {name: {_iregex: $name}}) { id name email pipeline_id total_score status resume_url } }";

pub const GET_CANDIDATE_SCORES_DETAIL: &str = "query GetCandidateScoresDetail($email: String!) { Candidate(where: {email: {_eq: $email}}) { id name email application_metadata total_score NodeResponses { score result } } }";

pub const CREATE_PIPELINE: &str =
    "mutation CreateCustomPipeline($object: Pipeline_insert_input!) { insert_Pipeline_one(object: $object) { id } }";

pub const INSERT_PIPELINE_NODES: &str = "mutation InsertNodes($objects: [PipelineNode_insert_input!]!) {insert_PipelineNode(objects: $objects) {affected_rows}}";

pub const GET_USER_COMPANY_ID: &str =
    "query GetUserCompanyId($userId: uuid!) { User(where: {id: {_eq: $userId}}) { company_id } }";

static CATALOG: LazyLock<Arc<ToolRegistry>> = LazyLock::new(|| Arc::new(build()));

/// The shared catalogue.
pub fn registry() -> Arc<ToolRegistry> {
    CATALOG.clone()
}

fn pipeline_id_param(purpose: &str) -> serde_json::Value {
    json!({
        "type": "string",
        "description": format!("The ID of the pipeline to query for {purpose}.")
    })
}

fn build() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(ToolDescriptor::query(
        "getRecentPipeline",
        "Get a list of pipelines sorted by their recently used. Typically this will be used as a precursor function.",
        json!({ "type": "object", "properties": {} }),
        GET_RECENT_PIPELINES,
    ));

    registry.register(ToolDescriptor::query(
        "getRecentlyFinishedCandidates",
        "Get the most recently finished candidates in a specified pipeline.",
        json!({
            "type": "object",
            "properties": { "pipeline_id": pipeline_id_param("finished candidates") },
            "required": ["pipeline_id"]
        }),
        GET_RECENTLY_FINISHED_CANDIDATES,
    ));

    registry.register(ToolDescriptor::query(
        "getTopCandidates",
        "Get the top candidates in a specified pipeline, ordered by total score.",
        json!({
            "type": "object",
            "properties": {
                "pipeline_id": pipeline_id_param("top candidates"),
                "limit": {
                    "type": "integer",
                    "description": "The maximum number of candidates to retrieve.",
                    "default": 10
                },
                "offset": {
                    "type": "integer",
                    "description": "The number of candidates to skip before starting to collect the results.",
                    "default": 0
                }
            },
            "required": ["pipeline_id"]
        }),
        GET_TOP_CANDIDATES,
    ));

    registry.register(ToolDescriptor::query(
        "getCandidateByEmail",
        "Retrieve candidate details using their email address.",
        json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "description": "Email of the candidate to retrieve details for." }
            },
            "required": ["email"]
        }),
        GET_CANDIDATE_BY_EMAIL,
    ));

    registry.register(ToolDescriptor::query(
        "getCandidateByName",
        "Retrieve candidate details using a case-insensitive includes, such as matching a first name.",
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Match the candidate's name, case-insensitive." }
            },
            "required": ["name"]
        }),
        GET_CANDIDATE_BY_NAME,
    ));

    registry.register(ToolDescriptor::query(
        "getCandidateScoresDetail",
        "Retrieve detailed score information for a candidate using their email address.",
        json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "description": "Email of the candidate to retrieve score details for." }
            },
            "required": ["email"]
        }),
        GET_CANDIDATE_SCORES_DETAIL,
    ));

    registry.register(ToolDescriptor::composite(Arc::new(CreatePipelineTool)));

    registry
}
