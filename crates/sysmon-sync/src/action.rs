use crate::cache::{PendingFetch, PollingCache, QueryKey};
use crate::error::ActionError;
use crate::notice::Notification;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{info, warn};

/// Identifies one operator attempt. Every invocation gets a fresh token, so a
/// confirmation can never be applied to a different attempt's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionToken(u64);

impl ActionToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Idle,
    Confirming,
    Executing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmVariant {
    Danger,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
    pub variant: ConfirmVariant,
}

impl ConfirmPrompt {
    pub fn new(title: impl Into<String>, message: impl Into<String>, variant: ConfirmVariant) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            variant,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionRequest<A> {
    pub target_id: String,
    pub kind: A,
    pub confirm: Option<ConfirmPrompt>,
    pub invalidates: Vec<QueryKey>,
    pub invalidates_resources: Vec<String>,
    pub success_message: Option<String>,
}

impl<A> ActionRequest<A> {
    pub fn new(target_id: impl Into<String>, kind: A) -> Self {
        Self {
            target_id: target_id.into(),
            kind,
            confirm: None,
            invalidates: Vec::new(),
            invalidates_resources: Vec::new(),
            success_message: None,
        }
    }

    pub fn confirm_with(mut self, prompt: ConfirmPrompt) -> Self {
        self.confirm = Some(prompt);
        self
    }

    pub fn invalidating(mut self, key: QueryKey) -> Self {
        self.invalidates.push(key);
        self
    }

    /// Invalidates every key of `resource` that is subscribed when the action
    /// completes, whatever its parameters are by then.
    pub fn invalidating_resource(mut self, resource: impl Into<String>) -> Self {
        self.invalidates_resources.push(resource.into());
        self
    }

    pub fn on_success(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct PendingAction<A> {
    pub token: ActionToken,
    pub target_id: String,
    pub kind: A,
    pub confirm: Option<ConfirmPrompt>,
    pub status: ActionStatus,
    invalidates: Vec<QueryKey>,
    invalidates_resources: Vec<String>,
    success_message: Option<String>,
}

impl<A> PendingAction<A> {
    pub fn confirmation_required(&self) -> bool {
        self.confirm.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteTicket<A> {
    pub token: ActionToken,
    pub target_id: String,
    pub kind: A,
}

#[derive(Debug)]
pub enum Invocation<A> {
    AwaitingConfirmation(ActionToken),
    Execute(ExecuteTicket<A>),
}

#[derive(Debug)]
pub struct ActionCompletion<T> {
    pub token: ActionToken,
    pub status: ActionStatus,
    pub notification: Notification,
    pub refetches: Vec<PendingFetch<T>>,
}

/// Mutate-then-revalidate for operator actions.
///
/// The invoker never performs the remote call. It hands out an
/// [`ExecuteTicket`] when the action may run and expects the outcome back
/// through [`ActionInvoker::complete`].
pub struct ActionInvoker<A> {
    actions: HashMap<ActionToken, PendingAction<A>>,
    executing: HashSet<String>,
    next_token: u64,
}

impl<A> Default for ActionInvoker<A> {
    fn default() -> Self {
        Self {
            actions: HashMap::new(),
            executing: HashSet::new(),
            next_token: 0,
        }
    }
}

impl<A: Clone + fmt::Display> ActionInvoker<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoke(&mut self, request: ActionRequest<A>) -> Result<Invocation<A>, ActionError> {
        if self.executing.contains(&request.target_id) {
            warn!(
                event = "action_rejected_busy",
                target = %request.target_id,
                kind = %request.kind
            );
            return Err(ActionError::TargetBusy {
                target: request.target_id,
            });
        }

        self.next_token += 1;
        let token = ActionToken(self.next_token);
        let needs_confirmation = request.confirm.is_some();
        self.actions.insert(
            token,
            PendingAction {
                token,
                target_id: request.target_id,
                kind: request.kind,
                confirm: request.confirm,
                status: if needs_confirmation {
                    ActionStatus::Confirming
                } else {
                    ActionStatus::Idle
                },
                invalidates: request.invalidates,
                invalidates_resources: request.invalidates_resources,
                success_message: request.success_message,
            },
        );

        if needs_confirmation {
            return Ok(Invocation::AwaitingConfirmation(token));
        }
        self.start(token).map(Invocation::Execute)
    }

    pub fn confirm(&mut self, token: ActionToken) -> Result<ExecuteTicket<A>, ActionError> {
        let action = self
            .actions
            .get(&token)
            .ok_or(ActionError::UnknownAction(token.id()))?;
        if action.status != ActionStatus::Confirming {
            return Err(ActionError::NotConfirming(token.id()));
        }
        self.start(token)
    }

    /// Declining has no remote effect; the attempt is simply dropped.
    pub fn decline(&mut self, token: ActionToken) -> bool {
        match self.actions.get(&token) {
            Some(action) if action.status == ActionStatus::Confirming => {
                self.actions.remove(&token);
                true
            }
            _ => false,
        }
    }

    fn start(&mut self, token: ActionToken) -> Result<ExecuteTicket<A>, ActionError> {
        let Some(action) = self.actions.get_mut(&token) else {
            return Err(ActionError::UnknownAction(token.id()));
        };
        if self.executing.contains(&action.target_id) {
            let target = action.target_id.clone();
            self.actions.remove(&token);
            warn!(event = "action_rejected_busy", target = %target, token = token.id());
            return Err(ActionError::TargetBusy { target });
        }

        action.status = ActionStatus::Executing;
        self.executing.insert(action.target_id.clone());
        info!(
            event = "action_executing",
            target = %action.target_id,
            kind = %action.kind,
            token = token.id()
        );
        Ok(ExecuteTicket {
            token,
            target_id: action.target_id.clone(),
            kind: action.kind.clone(),
        })
    }

    /// Records the remote outcome. Success invalidates the request's keys in
    /// `cache`; failure leaves the cache untouched.
    pub fn complete<T>(
        &mut self,
        token: ActionToken,
        result: Result<(), ActionError>,
        cache: &mut PollingCache<T>,
    ) -> Result<ActionCompletion<T>, ActionError> {
        match self.actions.get(&token) {
            None => return Err(ActionError::UnknownAction(token.id())),
            Some(action) if action.status != ActionStatus::Executing => {
                return Err(ActionError::NotExecuting(token.id()));
            }
            Some(_) => {}
        }
        let Some(mut action) = self.actions.remove(&token) else {
            return Err(ActionError::UnknownAction(token.id()));
        };
        self.executing.remove(&action.target_id);

        match result {
            Ok(()) => {
                action.status = ActionStatus::Succeeded;
                let mut keys = action.invalidates.clone();
                for key in cache.subscribed_keys() {
                    let matches = action
                        .invalidates_resources
                        .iter()
                        .any(|resource| key.resource() == resource);
                    if matches && !keys.contains(&key) {
                        keys.push(key);
                    }
                }
                let refetches: Vec<PendingFetch<T>> = keys
                    .iter()
                    .filter_map(|key| cache.invalidate(key))
                    .collect();
                info!(
                    event = "action_succeeded",
                    target = %action.target_id,
                    kind = %action.kind,
                    refetches = refetches.len()
                );
                let message = action.success_message.take().unwrap_or_else(|| {
                    format!("{} succeeded for {}", action.kind, action.target_id)
                });
                Ok(ActionCompletion {
                    token,
                    status: action.status,
                    notification: Notification::success(message),
                    refetches,
                })
            }
            Err(err) => {
                action.status = ActionStatus::Failed;
                warn!(
                    event = "action_failed",
                    target = %action.target_id,
                    kind = %action.kind,
                    error = %err
                );
                Ok(ActionCompletion {
                    token,
                    status: action.status,
                    notification: Notification::error(format!(
                        "{} failed for {}: {err}",
                        action.kind, action.target_id
                    )),
                    refetches: Vec::new(),
                })
            }
        }
    }

    pub fn pending(&self, token: ActionToken) -> Option<&PendingAction<A>> {
        self.actions.get(&token)
    }

    pub fn is_executing(&self, target_id: &str) -> bool {
        self.executing.contains(target_id)
    }

    pub fn awaiting_confirmation(&self) -> Vec<&PendingAction<A>> {
        let mut waiting: Vec<&PendingAction<A>> = self
            .actions
            .values()
            .filter(|action| action.status == ActionStatus::Confirming)
            .collect();
        waiting.sort_by_key(|action| action.token);
        waiting
    }
}
