//! Ordered, idempotent creation of one tenant's resource set.
//!
//! ```text
//! Start → CreatePolicy → CreateTemplate → CreateIndexAndAlias → Complete
//! ```
//!
//! Each step checks existence first and only creates when missing. An
//! "already exists" conflict on creation counts as success, since another
//! process may have won the race. Any other error aborts the sequence at
//! that step; later steps reference earlier resources by name and are
//! never attempted out of order.

use serde_json::Value;
use sluice_core::{
    Partitioning, ProvisionError, ProvisionStep, RemoteError, RemoteResult, ResourceNames,
    TenantKey,
};
use sluice_remote::{Clock, RemoteResourceClient, ResourceSpecBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Created,
    AlreadyExisted,
}

/// Summary of a completed provisioning attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub names: ResourceNames,
    /// Outcome of each step, in execution order.
    pub steps: Vec<(ProvisionStep, StepOutcome)>,
    /// Physical index created by this attempt, if one was created.
    pub created_index: Option<String>,
}

impl ProvisionReport {
    /// Steps that actually created a resource.
    pub fn created(&self) -> impl Iterator<Item = ProvisionStep> + '_ {
        self.steps
            .iter()
            .filter(|(_, outcome)| *outcome == StepOutcome::Created)
            .map(|(step, _)| *step)
    }
}

/// Runs the three-step creation sequence against the remote store.
pub struct ResourceProvisioner {
    client: Arc<dyn RemoteResourceClient>,
    specs: Arc<dyn ResourceSpecBuilder>,
    clock: Arc<dyn Clock>,
    prefix: String,
    partitioning: Partitioning,
}

impl ResourceProvisioner {
    pub fn new(
        client: Arc<dyn RemoteResourceClient>,
        specs: Arc<dyn ResourceSpecBuilder>,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
        partitioning: Partitioning,
    ) -> Self {
        Self {
            client,
            specs,
            clock,
            prefix: prefix.into(),
            partitioning,
        }
    }

    pub fn names_for(&self, key: &TenantKey) -> ResourceNames {
        ResourceNames::for_key(&self.prefix, key)
    }

    /// Execute the creation sequence for `key`.
    ///
    /// Stops at the first step that fails with anything other than a
    /// conflict; the error names the key and the step.
    pub async fn provision(
        &self,
        key: &TenantKey,
        attempt_id: Uuid,
    ) -> Result<ProvisionReport, ProvisionError> {
        let names = self.names_for(key);
        let mut steps = Vec::with_capacity(ProvisionStep::SEQUENCE.len());

        let policy = self
            .ensure_policy(&names)
            .await
            .map_err(|source| step_failed(key, ProvisionStep::CreatePolicy, source))?;
        trace_step(key, attempt_id, ProvisionStep::CreatePolicy, policy);
        steps.push((ProvisionStep::CreatePolicy, policy));

        let template = self
            .ensure_template(&names)
            .await
            .map_err(|source| step_failed(key, ProvisionStep::CreateTemplate, source))?;
        trace_step(key, attempt_id, ProvisionStep::CreateTemplate, template);
        steps.push((ProvisionStep::CreateTemplate, template));

        let (index, created_index) = self
            .ensure_write_index(&names)
            .await
            .map_err(|source| step_failed(key, ProvisionStep::CreateIndexAndAlias, source))?;
        trace_step(key, attempt_id, ProvisionStep::CreateIndexAndAlias, index);
        steps.push((ProvisionStep::CreateIndexAndAlias, index));

        Ok(ProvisionReport {
            names,
            steps,
            created_index,
        })
    }

    async fn ensure_policy(&self, names: &ResourceNames) -> RemoteResult<StepOutcome> {
        if self.client.policy_exists(&names.policy).await? {
            return Ok(StepOutcome::AlreadyExisted);
        }
        let body = self.specs.policy(names);
        settle(self.client.create_policy(&names.policy, &body).await)
    }

    async fn ensure_template(&self, names: &ResourceNames) -> RemoteResult<StepOutcome> {
        if self.client.template_exists(&names.template).await? {
            return Ok(StepOutcome::AlreadyExisted);
        }
        let body = self.specs.template(names);
        settle(self.client.create_template(&names.template, &body).await)
    }

    async fn ensure_write_index(
        &self,
        names: &ResourceNames,
    ) -> RemoteResult<(StepOutcome, Option<String>)> {
        if self.client.write_index_exists(&names.write_alias).await? {
            return Ok((StepOutcome::AlreadyExisted, None));
        }
        let index = names.initial_index(self.partitioning, self.clock.today());
        let body: Value = self.specs.index(names);
        let outcome = settle(
            self.client
                .create_index_with_write_alias(&index, &names.write_alias, &body)
                .await,
        )?;
        let created = (outcome == StepOutcome::Created).then_some(index);
        Ok((outcome, created))
    }
}

/// Map a create result: conflicts mean someone else created it first.
fn settle(result: RemoteResult<()>) -> RemoteResult<StepOutcome> {
    match result {
        Ok(()) => Ok(StepOutcome::Created),
        Err(RemoteError::Conflict { .. }) => Ok(StepOutcome::AlreadyExisted),
        Err(err) => Err(err),
    }
}

fn step_failed(key: &TenantKey, step: ProvisionStep, source: RemoteError) -> ProvisionError {
    ProvisionError::StepFailed {
        key: key.clone(),
        step,
        source,
    }
}

fn trace_step(key: &TenantKey, attempt_id: Uuid, step: ProvisionStep, outcome: StepOutcome) {
    match outcome {
        StepOutcome::Created => {
            tracing::debug!(tenant_key = %key, %attempt_id, %step, "Created resource")
        }
        StepOutcome::AlreadyExisted => {
            tracing::debug!(tenant_key = %key, %attempt_id, %step, "Resource already present")
        }
    }
}
