//! Shell-command effector
//!
//! Declared on an entity with a command template, a parameter signature and
//! an optional effector-level shell environment. Invocation composes a
//! single layered environment, later layers winning on key collision:
//!
//! 1. every declared parameter, with its resolved value (defaults included)
//! 2. the entity's own shell-environment configuration (`shell.env`)
//! 3. the effector-level shell environment
//! 4. all other call-time arguments, excluding the `shell.env` key itself

use crate::env::{make_command_executing_in_dir, ShellEnvironmentSerializer};
use crate::error::{EffectorError, Result};
use crate::remote::{CommandRequest, RemoteExecutor};
use arbor_entity::{
    EntityHandle, ManagementContext, Task, TaskError, TaskValue,
};
use arbor_types::{ConfigValue, ManagementEvent, ValueKind};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{instrument, warn};

/// Config key holding an entity's shell-environment map
pub const SHELL_ENVIRONMENT_KEY: &str = "shell.env";

/// A parameter declared on an effector's signature
#[derive(Clone, Debug)]
pub struct EffectorParameter {
    pub name: String,
    pub kind: ValueKind,
    pub default: Option<ConfigValue>,
    pub description: Option<String>,
}

impl EffectorParameter {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<ConfigValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// What to do when a deferred environment value fails to resolve
///
/// The mapping step resolves every value deeply; resolution can fail when a
/// reference names an unknown entity or key. `BestEffort` keeps the
/// unresolved value and continues - environment assembly is best-effort.
/// `Fail` aborts the effector call instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnresolvedValuePolicy {
    #[default]
    BestEffort,
    Fail,
}

/// A declared shell-command effector
pub struct CmdEffector {
    name: String,
    command: String,
    execution_dir: Option<String>,
    parameters: Vec<EffectorParameter>,
    shell_env: BTreeMap<String, ConfigValue>,
    unresolved_policy: UnresolvedValuePolicy,
}

impl CmdEffector {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            execution_dir: None,
            parameters: Vec::new(),
            shell_env: BTreeMap::new(),
            unresolved_policy: UnresolvedValuePolicy::default(),
        }
    }

    /// Directory the command executes in (created if absent)
    pub fn with_execution_dir(mut self, dir: impl Into<String>) -> Self {
        self.execution_dir = Some(dir.into());
        self
    }

    /// Declare a parameter on the effector's signature
    pub fn with_parameter(mut self, parameter: EffectorParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set an effector-level shell-environment entry
    pub fn with_shell_env(
        mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Self {
        self.shell_env.insert(key.into(), value.into());
        self
    }

    /// Choose how unresolved environment values are handled
    pub fn with_unresolved_policy(mut self, policy: UnresolvedValuePolicy) -> Self {
        self.unresolved_policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[EffectorParameter] {
        &self.parameters
    }

    /// Invoke the effector against an entity
    ///
    /// Requires a zero exit status; returns the command's captured stdout.
    #[instrument(skip(self, entity, mgmt, remote, call_params), fields(effector = %self.name, entity = %entity.id()))]
    pub async fn invoke(
        &self,
        entity: &EntityHandle,
        mgmt: &Arc<ManagementContext>,
        remote: Arc<dyn RemoteExecutor>,
        call_params: BTreeMap<String, ConfigValue>,
    ) -> Result<String> {
        let env = self.compose_environment(entity, mgmt, &call_params)?;

        let command = make_command_executing_in_dir(&self.command, self.execution_dir.as_deref());
        let request = CommandRequest {
            command,
            env: ShellEnvironmentSerializer::serialize(&env),
            summary: format!("effector {}", self.name),
        };

        // The remote command runs as a task under the entity's execution
        // context; a non-zero exit or transport fault is the effector's
        // failure.
        let effector_name = self.name.clone();
        let failure: Arc<Mutex<Option<EffectorError>>> = Arc::new(Mutex::new(None));
        let body = {
            let failure = failure.clone();
            let remote = remote.clone();
            let task_name = request.summary.clone();
            async move {
                let result = match remote.execute(request).await {
                    Ok(outcome) if outcome.exit_status == 0 => {
                        return Ok(TaskValue::Text(outcome.stdout))
                    }
                    Ok(outcome) => EffectorError::CommandFailed {
                        effector: effector_name,
                        exit_status: outcome.exit_status,
                        stderr: outcome.stderr,
                    },
                    Err(e) => e,
                };
                let message = result.to_string();
                *failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(result);
                Err(TaskError::Failed {
                    task: task_name,
                    message,
                })
            }
            .boxed()
        };

        let submitted = mgmt
            .executor()
            .submit(Task::transient(format!("effector {}", self.name), body))
            .await;

        match submitted {
            Ok(TaskValue::Text(stdout)) => {
                mgmt.emit_info(ManagementEvent::EffectorInvoked {
                    entity: entity.id().clone(),
                    effector: self.name.clone(),
                });
                Ok(stdout)
            }
            Ok(_) => Ok(String::new()),
            Err(task_error) => Err(failure
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .take()
                .unwrap_or(EffectorError::Task(task_error))),
        }
    }

    /// Compose the layered environment and deeply resolve every value
    fn compose_environment(
        &self,
        entity: &EntityHandle,
        mgmt: &Arc<ManagementContext>,
        call_params: &BTreeMap<String, ConfigValue>,
    ) -> Result<BTreeMap<String, ConfigValue>> {
        let mut env: BTreeMap<String, ConfigValue> = BTreeMap::new();

        // 1. Declared parameters, defaults included.
        for parameter in &self.parameters {
            let value = call_params
                .get(&parameter.name)
                .cloned()
                .or_else(|| parameter.default.clone());
            if let Some(value) = value {
                env.insert(parameter.name.clone(), value);
            }
        }

        // 2. The entity's own shell environment, if configured.
        if let Some(ConfigValue::Map(entity_env)) = entity.config_value(SHELL_ENVIRONMENT_KEY) {
            env.extend(entity_env);
        }

        // 3. The effector-level shell environment.
        env.extend(self.shell_env.clone());

        // 4. Remaining call-time arguments. Repeats declared parameters to
        //    no harm, and must not re-introduce the shell-environment key
        //    as a scalar entry.
        for (key, value) in call_params {
            if key != SHELL_ENVIRONMENT_KEY {
                env.insert(key.clone(), value.clone());
            }
        }

        // Force every deferred value to its concrete form.
        let mut resolved = BTreeMap::new();
        for (key, value) in env {
            if !value.contains_reference() {
                resolved.insert(key, value);
                continue;
            }
            match mgmt.resolve_value(&value) {
                Ok(concrete) => {
                    resolved.insert(key, concrete);
                }
                Err(e) => match self.unresolved_policy {
                    UnresolvedValuePolicy::BestEffort => {
                        warn!(key = %key, error = %e, "Keeping unresolved environment value");
                        resolved.insert(key, value);
                    }
                    UnresolvedValuePolicy::Fail => {
                        return Err(EffectorError::Resolution { key, source: e });
                    }
                },
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::CommandOutcome;
    use arbor_entity::{
        EntityFactory, EntitySpec, LocalTaskExecutor, NoOpPolicyFactory,
    };
    use arbor_registry::{EntityTypeDefinition, InMemoryTypeRegistry};
    use arbor_types::EntityId;
    use async_trait::async_trait;

    /// Remote executor that records the last request and returns a
    /// programmed outcome
    struct FakeRemoteExecutor {
        outcome: CommandOutcome,
        last_request: Mutex<Option<CommandRequest>>,
    }

    impl FakeRemoteExecutor {
        fn succeeding(stdout: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: CommandOutcome::success(stdout),
                last_request: Mutex::new(None),
            })
        }

        fn failing(exit_status: i32, stderr: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: CommandOutcome::failure(exit_status, stderr),
                last_request: Mutex::new(None),
            })
        }

        fn last_request(&self) -> CommandRequest {
            self.last_request.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl RemoteExecutor for FakeRemoteExecutor {
        async fn execute(
            &self,
            request: CommandRequest,
        ) -> std::result::Result<CommandOutcome, EffectorError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(self.outcome.clone())
        }
    }

    fn context() -> Arc<ManagementContext> {
        let registry = InMemoryTypeRegistry::new();
        registry
            .register(EntityTypeDefinition::basic("app.server"))
            .unwrap();
        Arc::new(ManagementContext::new(
            Arc::new(registry),
            Arc::new(NoOpPolicyFactory),
            Arc::new(LocalTaskExecutor),
        ))
    }

    async fn entity_with_shell_env(
        mgmt: &Arc<ManagementContext>,
        shell_env: BTreeMap<String, ConfigValue>,
    ) -> EntityHandle {
        let factory = EntityFactory::new(mgmt.clone());
        factory
            .create_entity(
                EntitySpec::new("app.server")
                    .with_config(SHELL_ENVIRONMENT_KEY, ConfigValue::Map(shell_env)),
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_environment_layering_order() {
        let mgmt = context();
        let mut entity_env = BTreeMap::new();
        entity_env.insert("TOKEN".to_string(), ConfigValue::from("x"));
        let entity = entity_with_shell_env(&mgmt, entity_env).await;

        let effector = CmdEffector::new("deploy", "./deploy.sh")
            .with_parameter(
                EffectorParameter::new("region", ValueKind::String).with_default("us-east"),
            )
            .with_shell_env("REGION", "override");

        let mut call_params = BTreeMap::new();
        call_params.insert("REGION".to_string(), ConfigValue::from("override"));
        call_params.insert("EXTRA".to_string(), ConfigValue::from("1"));

        let remote = FakeRemoteExecutor::succeeding("done");
        let stdout = effector
            .invoke(&entity, &mgmt, remote.clone(), call_params)
            .await
            .unwrap();
        assert_eq!(stdout, "done");

        // Later layers win on collision; earlier layers' non-colliding keys
        // survive.
        let env = remote.last_request().env;
        assert_eq!(env.get("REGION"), Some(&"override".to_string()));
        assert_eq!(env.get("TOKEN"), Some(&"x".to_string()));
        assert_eq!(env.get("EXTRA"), Some(&"1".to_string()));
        assert_eq!(env.get("region"), Some(&"us-east".to_string()));
        assert_eq!(env.len(), 4);
    }

    #[tokio::test]
    async fn test_call_time_shell_env_key_is_excluded() {
        let mgmt = context();
        let entity = entity_with_shell_env(&mgmt, BTreeMap::new()).await;

        let effector = CmdEffector::new("run", "./run.sh");
        let mut call_params = BTreeMap::new();
        call_params.insert(
            SHELL_ENVIRONMENT_KEY.to_string(),
            ConfigValue::from("should-not-appear"),
        );

        let remote = FakeRemoteExecutor::succeeding("");
        effector
            .invoke(&entity, &mgmt, remote.clone(), call_params)
            .await
            .unwrap();

        assert!(!remote.last_request().env.contains_key(SHELL_ENVIRONMENT_KEY));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_effector_failure() {
        let mgmt = context();
        let entity = entity_with_shell_env(&mgmt, BTreeMap::new()).await;

        let effector = CmdEffector::new("deploy", "./deploy.sh");
        let remote = FakeRemoteExecutor::failing(2, "disk full");

        let err = effector
            .invoke(&entity, &mgmt, remote, BTreeMap::new())
            .await
            .unwrap_err();
        match err {
            EffectorError::CommandFailed {
                effector,
                exit_status,
                stderr,
            } => {
                assert_eq!(effector, "deploy");
                assert_eq!(exit_status, 2);
                assert_eq!(stderr, "disk full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_execution_dir_wraps_command() {
        let mgmt = context();
        let entity = entity_with_shell_env(&mgmt, BTreeMap::new()).await;

        let effector =
            CmdEffector::new("deploy", "./deploy.sh").with_execution_dir("/opt/app");
        let remote = FakeRemoteExecutor::succeeding("");
        effector
            .invoke(&entity, &mgmt, remote.clone(), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(
            remote.last_request().command,
            "mkdir -p /opt/app && cd /opt/app && ./deploy.sh"
        );
    }

    #[tokio::test]
    async fn test_deferred_values_are_resolved() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());
        let db = factory
            .create_entity(
                EntitySpec::new("app.server").with_config("host.name", "db.internal"),
                Some(EntityId::new("db")),
            )
            .await
            .unwrap();
        let entity = entity_with_shell_env(&mgmt, BTreeMap::new()).await;

        let effector = CmdEffector::new("connect", "./connect.sh");
        let mut call_params = BTreeMap::new();
        call_params.insert(
            "DB_HOST".to_string(),
            ConfigValue::Reference {
                entity: db.id().clone(),
                key: "host.name".into(),
            },
        );

        let remote = FakeRemoteExecutor::succeeding("");
        effector
            .invoke(&entity, &mgmt, remote.clone(), call_params)
            .await
            .unwrap();

        assert_eq!(
            remote.last_request().env.get("DB_HOST"),
            Some(&"db.internal".to_string())
        );
    }

    #[tokio::test]
    async fn test_best_effort_keeps_unresolved_values() {
        let mgmt = context();
        let entity = entity_with_shell_env(&mgmt, BTreeMap::new()).await;

        let effector = CmdEffector::new("run", "./run.sh");
        let mut call_params = BTreeMap::new();
        call_params.insert(
            "MISSING".to_string(),
            ConfigValue::Reference {
                entity: EntityId::new("ghost"),
                key: "k".into(),
            },
        );

        let remote = FakeRemoteExecutor::succeeding("");
        effector
            .invoke(&entity, &mgmt, remote.clone(), call_params)
            .await
            .unwrap();

        // The call proceeds; the unresolved value survives as its marker
        // form.
        assert!(remote.last_request().env.contains_key("MISSING"));
    }

    #[tokio::test]
    async fn test_fail_policy_aborts_on_unresolved_value() {
        let mgmt = context();
        let entity = entity_with_shell_env(&mgmt, BTreeMap::new()).await;

        let effector = CmdEffector::new("run", "./run.sh")
            .with_unresolved_policy(UnresolvedValuePolicy::Fail);
        let mut call_params = BTreeMap::new();
        call_params.insert(
            "MISSING".to_string(),
            ConfigValue::Reference {
                entity: EntityId::new("ghost"),
                key: "k".into(),
            },
        );

        let remote = FakeRemoteExecutor::succeeding("");
        let err = effector
            .invoke(&entity, &mgmt, remote, call_params)
            .await
            .unwrap_err();
        assert!(matches!(err, EffectorError::Resolution { key, .. } if key == "MISSING"));
    }
}
