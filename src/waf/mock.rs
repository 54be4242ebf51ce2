//! In-memory WAF used by the resource tests.
//!
//! Keeps one IP set and its token state, and can be told to drop, reject or
//! fail upcoming calls to exercise the convergence loops.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{IpSetDescriptor, IpSetFilter, IpSetPayload, IpSetResponse, Mutation, UpdateAction, UpdateResponse, WafApi};
use crate::config::Generation;
use crate::error::{WafError, WafResult};
use crate::token::VersionToken;

#[derive(Debug, Default)]
pub struct FakeState {
    pub generation: Generation,
    pub id: String,
    pub name: Option<String>,
    pub entries: Vec<IpSetDescriptor>,

    /// Bumped by every applied mutation (wafv2 lock token)
    version: u64,
    /// Last change token handed out (waf, waf-regional)
    change_token: Option<String>,
    tokens_issued: u64,

    /// Upcoming updates accepted but silently not applied (stale token)
    pub stale_updates: u32,
    /// Upcoming updates failing with a transport error
    pub failing_updates: u32,
    /// Upcoming get-ip-set calls failing with a transport error
    pub failing_lists: u32,
    /// Upcoming get-change-token calls returning no token
    pub missing_tokens: u32,
    /// get-ip-set returns no IPSet at all
    pub missing_payload: bool,
    /// get-ip-set returns an empty IPSet object
    pub empty_payload: bool,
    /// Id reported by get-ip-set instead of the real one
    pub reported_id: Option<String>,
    /// get-ip-set leaves the id out of the IPSet object
    pub omit_id: bool,

    pub list_calls: usize,
    pub token_calls: usize,
    pub updates: Vec<Mutation>,
}

pub struct FakeWaf {
    state: Mutex<FakeState>,
}

impl FakeWaf {
    pub fn new(generation: Generation, id: &str, name: Option<&str>, values: &[&str]) -> Self {
        Self {
            state: Mutex::new(FakeState {
                generation,
                id: id.to_string(),
                name: name.map(str::to_string),
                entries: values.iter().map(|v| IpSetDescriptor::from_value(*v)).collect(),
                ..FakeState::default()
            }),
        }
    }

    pub fn legacy(id: &str, values: &[&str]) -> Self {
        Self::new(Generation::Legacy, id, None, values)
    }

    pub fn regional(id: &str, values: &[&str]) -> Self {
        Self::new(Generation::Regional, id, None, values)
    }

    pub fn v2(id: &str, name: &str, values: &[&str]) -> Self {
        Self::new(Generation::V2, id, Some(name), values)
    }

    /// Fill the set with `count` distinct IPv4 hosts
    pub fn with_hosts(self, count: usize) -> Self {
        self.configure(|s| {
            s.entries = (0..count)
                .map(|i| {
                    IpSetDescriptor::new(
                        "IPV4",
                        format!("10.{}.{}.{}/32", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff),
                    )
                })
                .collect()
        });
        self
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeState)) {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard);
    }

    pub fn inspect<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        let guard = self.state.lock().unwrap();
        f(&guard)
    }

    pub fn values(&self) -> Vec<String> {
        self.inspect(|s| s.entries.iter().map(|e| e.value.clone()).collect())
    }

    pub fn update_count(&self) -> usize {
        self.inspect(|s| s.updates.len())
    }
}

impl FakeState {
    fn lock_token(&self) -> String {
        format!("lock-{}", self.version)
    }

    fn check_filter(&self, filter: &IpSetFilter) -> WafResult<()> {
        if filter.generation != self.generation {
            return Err(WafError::Transport(format!(
                "{} client used against a {} IP set",
                filter.generation, self.generation
            )));
        }
        if filter.id != self.id {
            return Err(WafError::Transport("WAFNonexistentItemException".to_string()));
        }
        if self.generation == Generation::V2 && (filter.name != self.name || filter.scope.is_none()) {
            return Err(WafError::Transport("WAFInvalidParameterException".to_string()));
        }
        Ok(())
    }

    fn apply_descriptors(&mut self, updates: &[super::DescriptorUpdate]) -> WafResult<()> {
        // All-or-nothing, like the real API
        let mut next = self.entries.clone();
        for update in updates {
            let pos = next.iter().position(|e| e.value == update.descriptor.value);
            match (update.action, pos) {
                (UpdateAction::Insert, None) => next.push(update.descriptor.clone()),
                (UpdateAction::Insert, Some(_)) => {}
                (UpdateAction::Delete, Some(i)) => {
                    next.remove(i);
                }
                (UpdateAction::Delete, None) => {
                    return Err(WafError::Transport(
                        "WAFNonexistentItemException: descriptor not in IP set".to_string(),
                    ));
                }
            }
        }
        self.entries = next;
        Ok(())
    }
}

#[async_trait]
impl WafApi for FakeWaf {
    async fn get_ip_set(&self, filter: &IpSetFilter) -> WafResult<IpSetResponse> {
        let mut s = self.state.lock().unwrap();
        s.list_calls += 1;
        s.check_filter(filter)?;

        if s.failing_lists > 0 {
            s.failing_lists -= 1;
            return Err(WafError::Transport("ThrottlingException".to_string()));
        }

        let lock_token = (s.generation == Generation::V2).then(|| s.lock_token());
        if s.missing_payload {
            return Ok(IpSetResponse {
                ip_set: None,
                lock_token,
            });
        }
        if s.empty_payload {
            return Ok(IpSetResponse {
                ip_set: Some(IpSetPayload::default()),
                lock_token,
            });
        }

        Ok(IpSetResponse {
            ip_set: Some(IpSetPayload {
                id: (!s.omit_id).then(|| s.reported_id.clone().unwrap_or_else(|| s.id.clone())),
                name: s.name.clone(),
                descriptors: s.entries.clone(),
            }),
            lock_token,
        })
    }

    async fn get_change_token(&self, filter: &IpSetFilter) -> WafResult<Option<String>> {
        let mut s = self.state.lock().unwrap();
        s.token_calls += 1;
        if filter.generation == Generation::V2 {
            return Err(WafError::Token("wafv2 has no change-token call".to_string()));
        }
        if s.missing_tokens > 0 {
            s.missing_tokens -= 1;
            return Ok(None);
        }
        s.tokens_issued += 1;
        let token = format!("change-{}", s.tokens_issued);
        s.change_token = Some(token.clone());
        Ok(Some(token))
    }

    async fn update_ip_set(
        &self,
        filter: &IpSetFilter,
        token: &VersionToken,
        mutation: &Mutation,
    ) -> WafResult<UpdateResponse> {
        let mut s = self.state.lock().unwrap();
        s.updates.push(mutation.clone());
        s.check_filter(filter)?;

        if s.failing_updates > 0 {
            s.failing_updates -= 1;
            return Err(WafError::Transport("ServiceUnavailable".to_string()));
        }

        match (s.generation, mutation) {
            (Generation::V2, Mutation::Replace(addresses)) => {
                if token.as_str() != s.lock_token() {
                    return Err(WafError::Transport("WAFOptimisticLockException".to_string()));
                }
                if s.stale_updates > 0 {
                    s.stale_updates -= 1;
                    return Ok(UpdateResponse { next_token: None });
                }
                s.entries = addresses.iter().map(|a| IpSetDescriptor::from_value(a.as_str())).collect();
                s.version += 1;
                Ok(UpdateResponse {
                    next_token: Some(s.lock_token()),
                })
            }
            (Generation::Legacy | Generation::Regional, Mutation::Descriptors(updates)) => {
                if s.change_token.as_deref() != Some(token.as_str()) {
                    return Err(WafError::Transport("WAFStaleDataException".to_string()));
                }
                s.change_token = None;
                if s.stale_updates > 0 {
                    s.stale_updates -= 1;
                    return Ok(UpdateResponse {
                        next_token: Some(token.to_string()),
                    });
                }
                s.apply_descriptors(updates)?;
                s.version += 1;
                Ok(UpdateResponse {
                    next_token: Some(token.to_string()),
                })
            }
            (generation, _) => Err(WafError::Transport(format!(
                "mutation style not accepted by {}",
                generation
            ))),
        }
    }
}
