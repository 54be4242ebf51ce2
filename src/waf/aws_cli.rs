//! AWS CLI backed WAF client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{IpSetDescriptor, IpSetFilter, IpSetPayload, IpSetResponse, Mutation, UpdateResponse, WafApi};
use crate::cmd_abstraction::{CommandExecutor, CommandOutput, RealCommandExecutor};
use crate::config::Generation;
use crate::error::{WafError, WafResult};
use crate::token::VersionToken;

#[derive(Debug, Deserialize)]
struct GetIpSetOutput {
    #[serde(rename = "IPSet")]
    ip_set: Option<RawIpSet>,
    #[serde(rename = "LockToken")]
    lock_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawIpSet {
    #[serde(rename = "IPSetId", alias = "Id")]
    id: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "IPSetDescriptors", default)]
    descriptors: Vec<IpSetDescriptor>,
    #[serde(rename = "Addresses", default)]
    addresses: Vec<String>,
}

impl From<RawIpSet> for IpSetPayload {
    fn from(raw: RawIpSet) -> Self {
        let mut descriptors = raw.descriptors;
        descriptors.extend(raw.addresses.into_iter().map(IpSetDescriptor::from_value));
        Self {
            id: raw.id,
            name: raw.name,
            descriptors,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChangeTokenOutput {
    #[serde(rename = "ChangeToken")]
    change_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateOutput {
    #[serde(rename = "ChangeToken")]
    change_token: Option<String>,
    #[serde(rename = "NextLockToken")]
    next_lock_token: Option<String>,
}

/// Talks to AWS WAF by running the `aws` command line tool
pub struct AwsCliClient<E: CommandExecutor = RealCommandExecutor> {
    executor: E,
    program: String,
    region: Option<String>,
    profile: Option<String>,
}

impl AwsCliClient<RealCommandExecutor> {
    pub fn new(program: &str, region: Option<String>, profile: Option<String>) -> Self {
        Self::with_executor(RealCommandExecutor::new(), program, region, profile)
    }
}

impl<E: CommandExecutor> AwsCliClient<E> {
    pub fn with_executor(
        executor: E,
        program: &str,
        region: Option<String>,
        profile: Option<String>,
    ) -> Self {
        Self {
            executor,
            program: program.to_string(),
            region,
            profile,
        }
    }

    /// `aws <service> <operation>`
    fn base_args(&self, generation: Generation, operation: &str) -> Vec<String> {
        vec![generation.cli_service().to_string(), operation.to_string()]
    }

    /// Identify the IP set on the command line
    fn push_filter(args: &mut Vec<String>, filter: &IpSetFilter) -> WafResult<()> {
        match filter.generation {
            Generation::Legacy | Generation::Regional => {
                args.extend(["--ip-set-id".to_string(), filter.id.clone()]);
            }
            Generation::V2 => {
                let name = filter.name.as_ref().ok_or_else(|| {
                    WafError::Configuration("wafv2 requires an IP set name".to_string())
                })?;
                let scope = filter.scope.unwrap_or_default();
                args.extend([
                    "--scope".to_string(),
                    scope.as_api_str().to_string(),
                    "--name".to_string(),
                    name.clone(),
                    "--id".to_string(),
                    filter.id.clone(),
                ]);
            }
        }
        Ok(())
    }

    /// Output format, region and profile
    fn push_options(&self, args: &mut Vec<String>) {
        args.extend(["--output".to_string(), "json".to_string()]);
        if let Some(ref region) = self.region {
            args.extend(["--region".to_string(), region.clone()]);
        }
        if let Some(ref profile) = self.profile {
            args.extend(["--profile".to_string(), profile.clone()]);
        }
    }

    fn run(&self, mut args: Vec<String>) -> WafResult<CommandOutput> {
        self.push_options(&mut args);
        debug!("{} {}", self.program, args.join(" "));

        let output = self
            .executor
            .execute(&self.program, &args)
            .map_err(|e| WafError::Transport(format!("{:#}", e)))?;

        if !output.success {
            return Err(WafError::Transport(format!(
                "{} {} failed: {}",
                args[0],
                args[1],
                output.failure_message()
            )));
        }
        Ok(output)
    }

    fn parse<T: serde::de::DeserializeOwned>(output: &CommandOutput) -> WafResult<T> {
        output
            .json()
            .map_err(|e| WafError::Transport(format!("{:#}", e)))
    }

    fn update_args(
        &self,
        filter: &IpSetFilter,
        token: &VersionToken,
        mutation: &Mutation,
    ) -> WafResult<Vec<String>> {
        let mut args = self.base_args(filter.generation, "update-ip-set");
        Self::push_filter(&mut args, filter)?;

        match (filter.generation, mutation) {
            (Generation::Legacy | Generation::Regional, Mutation::Descriptors(updates)) => {
                let updates = serde_json::to_string(updates)
                    .map_err(|e| WafError::Transport(e.to_string()))?;
                args.extend([
                    "--change-token".to_string(),
                    token.as_str().to_string(),
                    "--updates".to_string(),
                    updates,
                ]);
            }
            (Generation::V2, Mutation::Replace(addresses)) => {
                let addresses = serde_json::to_string(addresses)
                    .map_err(|e| WafError::Transport(e.to_string()))?;
                args.extend([
                    "--addresses".to_string(),
                    addresses,
                    "--lock-token".to_string(),
                    token.as_str().to_string(),
                ]);
            }
            (generation, _) => {
                return Err(WafError::Configuration(format!(
                    "mutation style not supported by {}",
                    generation
                )));
            }
        }
        Ok(args)
    }
}

#[async_trait]
impl<E: CommandExecutor> WafApi for AwsCliClient<E> {
    async fn get_ip_set(&self, filter: &IpSetFilter) -> WafResult<IpSetResponse> {
        let mut args = self.base_args(filter.generation, "get-ip-set");
        Self::push_filter(&mut args, filter)?;

        let output = self.run(args)?;
        let parsed: GetIpSetOutput = Self::parse(&output)?;

        Ok(IpSetResponse {
            ip_set: parsed.ip_set.map(IpSetPayload::from),
            lock_token: parsed.lock_token,
        })
    }

    async fn get_change_token(&self, filter: &IpSetFilter) -> WafResult<Option<String>> {
        if filter.generation == Generation::V2 {
            return Err(WafError::Token(
                "wafv2 has no change-token call; lock tokens come from get-ip-set".to_string(),
            ));
        }

        let output = self.run(self.base_args(filter.generation, "get-change-token"))?;
        let parsed: ChangeTokenOutput = Self::parse(&output)?;
        Ok(parsed.change_token)
    }

    async fn update_ip_set(
        &self,
        filter: &IpSetFilter,
        token: &VersionToken,
        mutation: &Mutation,
    ) -> WafResult<UpdateResponse> {
        let args = self.update_args(filter, token, mutation)?;
        let output = self.run(args)?;

        // Some CLI versions print nothing on success
        let parsed: UpdateOutput = if output.stdout.trim().is_empty() {
            UpdateOutput::default()
        } else {
            Self::parse(&output)?
        };

        Ok(UpdateResponse {
            next_token: parsed.next_lock_token.or(parsed.change_token),
        })
    }
}
