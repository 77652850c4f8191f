//! Advisor implementations
//!
//! `HttpAdvisor` posts the advisory context as JSON to a remote reasoning
//! service. `RuleAdvisor` applies a handful of local rules and is used when no
//! endpoint is configured.

use super::{Advisor, CapabilityError, CapabilityResult};
use crate::brain::{AdvisoryContext, BrainDecision, Verdict};
use crate::model::Adaptation;
use async_trait::async_trait;
use reqwest::Client;

/// Remote advisor speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpAdvisor {
    client: Client,
    endpoint: String,
}

impl HttpAdvisor {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn analyze(&self, context: &AdvisoryContext) -> CapabilityResult<BrainDecision> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(context)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::InvalidResponse(format!(
                "advisor answered HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json::<BrainDecision>()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))
    }
}

/// Offline advisor with fixed rules
///
/// | Outcome | Decision |
/// |---------|----------|
/// | Captcha page | `CAPTCHA_HUMAN_SOLVE` |
/// | Login wall | `LOGIN_WALL_HUMAN` |
/// | Start URL failed and is invalid | `TRY_NEW_URL` |
/// | Start URL failed but validates | `RETRY_CYCLE_SOON` |
/// | Listing page with zero jobs on the first attempt | `RETRY_EXTRACTION` |
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleAdvisor;

fn decide_by_rules(context: &AdvisoryContext) -> BrainDecision {
    use crate::model::PageType;

    let decision = |verdict, action, reason: &str| BrainDecision {
        reasoning: Some(reason.to_string()),
        ..BrainDecision::adapt(verdict, action)
    };

    match context.page_type {
        PageType::Captcha => {
            return decision(
                Verdict::Blocked,
                Adaptation::CaptchaHumanSolve,
                "captcha detected",
            )
        }
        PageType::LoginWall => {
            return decision(
                Verdict::Blocked,
                Adaptation::LoginWallHuman,
                "login wall detected",
            )
        }
        _ => {}
    }

    if context.error.is_some() && context.depth == 0 {
        let valid = context.validation.as_ref().map(|v| v.is_valid);
        return match valid {
            Some(false) => decision(
                Verdict::Broken,
                Adaptation::TryNewUrl,
                "start URL does not validate",
            ),
            _ if context.attempt <= 1 => decision(
                Verdict::Degraded,
                Adaptation::RetryCycleSoon,
                "start URL failed transiently",
            ),
            _ => BrainDecision::proceed(),
        };
    }

    if context.error.is_none()
        && context.page_type.is_listing()
        && context.jobs_count == 0
        && context.attempt <= 1
    {
        return decision(
            Verdict::Degraded,
            Adaptation::RetryExtraction,
            "listing page yielded no postings",
        );
    }

    BrainDecision::proceed()
}

#[async_trait]
impl Advisor for RuleAdvisor {
    async fn analyze(&self, context: &AdvisoryContext) -> CapabilityResult<BrainDecision> {
        Ok(decide_by_rules(context))
    }
}
