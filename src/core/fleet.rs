//! Fleet driver.
//!
//! Wires the config, access registry, stores, generator runner and sync
//! together. Batches of machines run on a bounded pool of scoped threads fed
//! from a crossbeam channel.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::access::{AccessControl, Reencrypt};
use crate::core::config::{self, FleetConfig, Machine};
use crate::core::constants;
use crate::core::domain::{RunReport, SyncOutcome, Var, VarKey};
use crate::core::generator::{PromptSource, PromptValues, RunCache, RunRequest, Runner};
use crate::core::store::{StoreContext, Stores, VarStore};
use crate::core::sync::{self, SshTransport, Transport};
use crate::core::types::{GeneratorName, MachineName};
use crate::error::{ConfigError, Result, StoreError};

/// Options of one `generate` call.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Machines to generate for; empty means every machine.
    pub machines: Vec<MachineName>,
    /// Regenerate even if outputs exist.
    pub regenerate: bool,
    /// Restrict to one generator (and its dependencies).
    pub generator: Option<GeneratorName>,
    /// Worker threads; 0 is treated as 1.
    pub jobs: usize,
    pub prompt_values: PromptValues,
}

/// State of one declared var, as shown by `list`.
#[derive(Debug, Clone, Serialize)]
pub struct VarStatus {
    pub machine: MachineName,
    pub generator: GeneratorName,
    pub file: String,
    pub shared: bool,
    pub secret: bool,
    pub deploy: bool,
    pub present: bool,
    /// Recipients recorded on the secret differ from its grants.
    pub stale: bool,
}

/// An opened fleet repository.
pub struct Fleet {
    repo: PathBuf,
    config: FleetConfig,
    access: Arc<AccessControl>,
    stores: Stores,
}

impl Fleet {
    /// Open the fleet described by the config at `config_path`.
    ///
    /// The repository root is the directory holding the config.
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = FleetConfig::load(config_path)?;
        let repo = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let access = Arc::new(AccessControl::open(
            &repo.join(constants::VARS_DIR).join(constants::ACCESS_FILE),
        )?);
        let ctx = StoreContext {
            repo: repo.clone(),
            access: Arc::clone(&access),
            keys: None,
        };
        let stores = Stores {
            secret: config.secret_store()?.open(&ctx)?,
            public: config.public_store()?.open(&ctx)?,
        };
        debug!(repo = %repo.display(), stores = ?stores, "fleet opened");

        Ok(Self::with_stores(repo, config, access, stores))
    }

    /// Assemble a fleet from already opened parts.
    pub fn with_stores(
        repo: PathBuf,
        config: FleetConfig,
        access: Arc<AccessControl>,
        stores: Stores,
    ) -> Self {
        Self {
            repo,
            config,
            access,
            stores,
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Hook passed to registry changes so affected secrets are re-encrypted.
    pub fn reencryptor(&self) -> &dyn Reencrypt {
        self.stores.secret.reencryptor()
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.repo.join(constants::VARS_DIR).join(constants::LOCK_DIR)
    }

    /// Resolve machine names; an empty list selects every machine.
    pub fn machines(&self, names: &[MachineName]) -> Result<Vec<&Machine>> {
        if names.is_empty() {
            return Ok(self.config.machines.values().collect());
        }
        let mut seen = BTreeSet::new();
        let mut machines = Vec::new();
        for name in names {
            let machine = self.config.machine(name)?;
            if seen.insert(name.as_str()) {
                machines.push(machine);
            }
        }
        Ok(machines)
    }

    /// Generate vars for the requested machines.
    ///
    /// Fails up front only for unknown machines or generators. Every
    /// machine then gets its own result, in request order.
    pub fn generate(
        &self,
        request: &GenerateRequest,
        prompts: &dyn PromptSource,
    ) -> Result<Vec<(MachineName, Result<RunReport>)>> {
        let mut machines = self.machines(&request.machines)?;
        if let Some(generator) = &request.generator {
            machines.retain(|m| m.generators.contains_key(generator));
            if machines.is_empty() {
                return Err(ConfigError::UnknownGenerator {
                    machine: request.machines.join(", "),
                    name: generator.clone(),
                }
                .into());
            }
        }
        if machines.is_empty() {
            return Ok(Vec::new());
        }
        config::ensure_gitignore(&self.repo)?;

        let cache = RunCache::new();
        let shared_owners = self.config.shared_owners();
        let lock_dir = self.lock_dir();
        let jobs = request.jobs.clamp(1, machines.len());
        info!(machines = machines.len(), jobs, "generating");

        let (tx, rx) = crossbeam::channel::unbounded();
        for (index, machine) in machines.iter().enumerate() {
            // The receiver outlives this loop, so sending cannot fail.
            let _ = tx.send((index, *machine));
        }
        drop(tx);

        let results = Mutex::new(Vec::with_capacity(machines.len()));
        std::thread::scope(|scope| {
            for _ in 0..jobs {
                let rx = rx.clone();
                let runner = Runner::new(&self.stores, lock_dir.clone(), prompts, &cache)
                    .with_shared_owners(shared_owners.clone());
                let results = &results;
                scope.spawn(move || {
                    for (index, machine) in rx.iter() {
                        let run = runner.run(
                            &machine.name,
                            &machine.generators,
                            &machine_request(machine, request),
                        );
                        results.lock().push((index, (machine.name.clone(), run)));
                    }
                });
            }
        });
        cache.clear();

        let mut results = results.into_inner();
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }

    /// Status of every declared var of the given machines.
    pub fn list(&self, machines: &[MachineName]) -> Result<Vec<VarStatus>> {
        let mut statuses = Vec::new();
        for machine in self.machines(machines)? {
            for generator in machine.generators.values() {
                for var in generator.vars(&machine.name) {
                    statuses.push(self.status(&machine.name, &var)?);
                }
            }
        }
        Ok(statuses)
    }

    fn status(&self, machine: &str, var: &Var) -> Result<VarStatus> {
        let store = self.stores.for_var(var);
        let present = store.exists(&var.key)?;
        let stale = present && store.needs_refresh(&var.key)?;
        Ok(VarStatus {
            machine: machine.to_string(),
            generator: var.key.generator.clone(),
            file: var.key.file.clone(),
            shared: var.key.is_shared(),
            secret: var.secret,
            deploy: var.deploy,
            present,
            stale,
        })
    }

    /// Delete a stored var and drop its grants.
    ///
    /// Keys no machine declares any more are still removed from whichever
    /// store holds them, so outputs of deleted generators can be cleaned up.
    pub fn delete(&self, key: &VarKey) -> Result<()> {
        let stores: Vec<&dyn VarStore> = match self.config.var(key) {
            Some(var) => vec![self.stores.for_var(&var)],
            None => vec![self.stores.secret.as_ref(), self.stores.public.as_ref()],
        };

        let mut deleted = false;
        for store in stores {
            if store.exists(key)? {
                store.delete(key)?;
                deleted = true;
            }
        }
        if !deleted {
            return Err(StoreError::NotFound(key.to_string()).into());
        }

        self.access.forget(&key.secret_ref())?;
        info!(key = %key, "var deleted");
        Ok(())
    }

    /// Upload a machine's deployed secrets to its `target_host` over ssh.
    pub fn upload(&self, machine: &str) -> Result<SyncOutcome> {
        let config = self.config.machine(machine)?;
        let host = config
            .target_host
            .as_deref()
            .ok_or_else(|| ConfigError::NoTargetHost(machine.to_string()))?;
        let transport = SshTransport::new(host, config.upload_dir.clone())
            .with_options(self.config.fleet.ssh_options.clone());
        self.upload_with(machine, &transport)
    }

    /// Upload a machine's deployed secrets through `transport`.
    pub fn upload_with(&self, machine: &str, transport: &dyn Transport) -> Result<SyncOutcome> {
        let keys = self.config.machine(machine)?.deployed_secrets();
        debug!(machine, files = keys.len(), "uploading");
        sync::upload(self.stores.secret.as_ref(), &keys, transport)
    }
}

fn machine_request(machine: &Machine, request: &GenerateRequest) -> RunRequest {
    let selected: Vec<GeneratorName> = request.generator.iter().cloned().collect();
    let forced = match (&request.generator, request.regenerate) {
        (_, false) => BTreeSet::new(),
        (Some(generator), true) => BTreeSet::from([generator.clone()]),
        (None, true) => machine.generators.keys().cloned().collect(),
    };
    RunRequest {
        selected,
        forced,
        prompt_values: request.prompt_values.clone(),
    }
}
