//! `createPipeline`: creates a recruiting pipeline with a starter set of stages.
//!
//! Steps run in order: describe the job (when no description was given),
//! look up the acting user's company, insert the pipeline, insert its
//! stages. The writes are not transactional; if the stage insert fails the
//! pipeline row stays and its id is reported in the failure.

use crate::catalog::{CREATE_PIPELINE, GET_USER_COMPANY_ID, INSERT_PIPELINE_NODES};
use async_trait::async_trait;
use recruitr_core::error::ToolError;
use recruitr_core::message::Message;
use recruitr_core::provider::ProviderRequest;
use recruitr_core::tool::{CompositeTool, ToolContext};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

const NAME: &str = "createPipeline";

/// Stages every new pipeline starts with, in order.
pub const STARTER_STAGES: &[&str] = &["Application Review", "Screening", "Interview", "Offer"];

const DESCRIPTION_PROMPT: &str = "You write concise, professional job descriptions for recruiting \
    pipelines. Reply with the description text only.";

#[derive(Debug, Deserialize)]
struct CreatePipelineArgs {
    pipeline_name: String,
    job_title: String,
    #[serde(default)]
    job_description: Option<String>,
    job_type: String,
    skills: String,
    #[serde(default)]
    experience: Option<String>,
    location: String,
    workplace_type: String,
}

pub struct CreatePipelineTool;

fn step_failed(step: &str, reason: impl ToString, created: serde_json::Value) -> ToolError {
    ToolError::StepFailed {
        tool_name: NAME.into(),
        step: step.into(),
        reason: reason.to_string(),
        created,
    }
}

impl CreatePipelineTool {
    async fn describe_job(
        args: &CreatePipelineArgs,
        ctx: &ToolContext<'_>,
    ) -> Result<String, ToolError> {
        let mut ask = format!(
            "Write a job description for a {} {} position ({}, {}). Required skills: {}.",
            args.job_type, args.job_title, args.workplace_type, args.location, args.skills
        );
        if let Some(experience) = &args.experience {
            ask.push_str(&format!(" Experience: {experience}."));
        }

        let request = ProviderRequest::text(
            ctx.model,
            vec![Message::system(DESCRIPTION_PROMPT), Message::user(ask)],
        );
        let response = ctx
            .provider
            .complete(request)
            .await
            .map_err(|e| step_failed("generate_description", e, json!({})))?;

        match response.message.content() {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(step_failed(
                "generate_description",
                "model returned an empty description",
                json!({}),
            )),
        }
    }

    async fn company_id(ctx: &ToolContext<'_>) -> Result<Option<serde_json::Value>, ToolError> {
        let Some(user_id) = ctx.credential.user_id() else {
            return Ok(None);
        };
        let data = ctx
            .executor
            .execute(ctx.credential, GET_USER_COMPANY_ID, json!({ "userId": user_id }))
            .await
            .map_err(|e| step_failed("lookup_company", e, json!({})))?;
        Ok(data["User"][0]
            .get("company_id")
            .filter(|id| !id.is_null())
            .cloned())
    }
}

#[async_trait]
impl CompositeTool for CreatePipelineTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Create a new recruiting pipeline with specified job details."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pipeline_name": { "type": "string", "description": "Name of the pipeline to be created." },
                "job_title": { "type": "string", "description": "Job title for the pipeline, e.g., Frontend Developer." },
                "job_description": { "type": "string", "description": "A detailed job description based on the job title and preferences." },
                "job_type": {
                    "type": "string",
                    "description": "Type of job recruitment. Possible values: Full-Time, Part-Time, Contract, Internship, Volunteer, Other. Ensure it is case-sensitive."
                },
                "skills": { "type": "string", "description": "skills required for the job role" },
                "experience": { "type": "string", "description": "experience level required for the job role" },
                "location": { "type": "string", "description": "Location for the recruitment." },
                "workplace_type": {
                    "type": "string",
                    "description": "Workplace type of the recruitment. Possible values: Remote, Hybrid, In-Office. Ensure it is case-sensitive."
                }
            },
            "required": ["pipeline_name", "job_title", "job_type", "location", "workplace_type", "skills"]
        })
    }

    async fn run(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext<'_>,
    ) -> Result<serde_json::Value, ToolError> {
        let args: CreatePipelineArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let job_description = match args.job_description.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => {
                debug!(job_title = %args.job_title, "Generating job description");
                Self::describe_job(&args, ctx).await?
            }
        };

        let company_id = Self::company_id(ctx).await?;

        let mut object = json!({
            "name": args.pipeline_name,
            "job_title": args.job_title,
            "job_description": job_description,
            "job_type": args.job_type,
            "skills": args.skills,
            "experience": args.experience,
            "location": args.location,
            "workplace_type": args.workplace_type,
        });
        if let Some(company_id) = company_id {
            object["company_id"] = company_id;
        }
        if let Some(user_id) = ctx.credential.user_id() {
            object["created_by"] = json!(user_id);
        }

        let data = ctx
            .executor
            .execute(ctx.credential, CREATE_PIPELINE, json!({ "object": object }))
            .await
            .map_err(|e| step_failed("insert_pipeline", e, json!({})))?;
        let pipeline_id = data["insert_Pipeline_one"]["id"].clone();
        if pipeline_id.is_null() {
            return Err(step_failed(
                "insert_pipeline",
                "response did not include a pipeline id",
                json!({}),
            ));
        }

        let nodes: Vec<serde_json::Value> = STARTER_STAGES
            .iter()
            .enumerate()
            .map(|(position, stage)| {
                json!({
                    "pipeline_id": pipeline_id,
                    "name": stage,
                    "position": position,
                })
            })
            .collect();

        let data = ctx
            .executor
            .execute(ctx.credential, INSERT_PIPELINE_NODES, json!({ "objects": nodes }))
            .await
            .map_err(|e| step_failed("insert_nodes", e, json!({ "pipeline_id": pipeline_id })))?;

        let stages_created = data["insert_PipelineNode"]["affected_rows"]
            .as_u64()
            .unwrap_or_default();
        info!(pipeline_id = %pipeline_id, stages_created, "Pipeline created");

        Ok(json!({
            "pipeline_id": pipeline_id,
            "pipeline_name": args.pipeline_name,
            "job_description": job_description,
            "stages_created": stages_created,
        }))
    }
}
