//! Orchestrates the rewrite of a pack run folder.

use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;

use crate::config::PackConfig;
use crate::error::ConfigurationError;
use crate::error::PackError;
use crate::error::PackResult;
use crate::error::UpdateStep;
use crate::k8s::KubeconfigNamespace;
use crate::k8s::NamespaceSource;
use crate::k8s::StaticNamespace;
use crate::pack::dockerfile;
use crate::pack::dockerfile::DockerfileUpdate;
use crate::pack::draft;
use crate::pack::script::DefaultScriptArgs;
use crate::pack::script::ScriptArgsFormatter;
use crate::pack::values;
use crate::pack::values::ValuesUpdate;
use crate::pack::RunFolder;
use crate::runtime::pull_best_effort;
use crate::runtime::DockerCli;
use crate::runtime::ImagePuller;
use crate::runtime::PullOutcome;

/// User parameters of one configuration update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub run_folder: PathBuf,
    pub script_location: Option<String>,
    pub script_parameters: Vec<String>,
    pub experiment_name: String,
    pub run_name: String,
    pub local_registry_port: u16,
    pub cluster_registry_port: u16,
    pub pack_type: String,
    /// `(key, value)` pairs applied to values.yaml in order.
    pub pack_params: Vec<(String, String)>,
    pub script_folder_location: Option<String>,
    /// `KEY=VALUE` strings appended to the chart's `env` list.
    ///
    /// A name that is already listed, or repeated here, keeps a single entry
    /// holding the last value given.
    pub env_variables: Vec<String>,
}

impl UpdateRequest {
    fn local_registry(&self) -> String {
        format!("127.0.0.1:{}", self.local_registry_port)
    }
}

/// What a successful update did besides rewriting files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// One entry per base image referenced by the Dockerfile; empty when no
    /// pull was attempted.
    pub image_pulls: Vec<PullOutcome>,
}

impl UpdateReport {
    pub fn pull_failed(&self) -> bool {
        self.image_pulls.iter().any(PullOutcome::is_failed)
    }
}

/// Rewrites pack files from user parameters.
pub struct PackConfigurator {
    config: PackConfig,
    image_puller: Box<dyn ImagePuller>,
    namespace_source: Box<dyn NamespaceSource>,
    script_args: Box<dyn ScriptArgsFormatter>,
}

impl PackConfigurator {
    /// Wires the default collaborators described by `config`.
    pub fn new(config: PackConfig) -> Self {
        let image_puller = Box::new(DockerCli::new(config.docker_binary.clone()));
        let namespace_source: Box<dyn NamespaceSource> = match &config.namespace {
            Some(namespace) => Box::new(StaticNamespace(namespace.clone())),
            None => Box::new(KubeconfigNamespace::new(config.kubeconfig.clone())),
        };
        Self {
            config,
            image_puller,
            namespace_source,
            script_args: Box::new(DefaultScriptArgs),
        }
    }

    pub fn with_image_puller(mut self, image_puller: impl ImagePuller + 'static) -> Self {
        self.image_puller = Box::new(image_puller);
        self
    }

    pub fn with_namespace_source(mut self, namespace_source: impl NamespaceSource + 'static) -> Self {
        self.namespace_source = Box::new(namespace_source);
        self
    }

    pub fn with_script_args(mut self, script_args: impl ScriptArgsFormatter + 'static) -> Self {
        self.script_args = Box::new(script_args);
        self
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Updates values.yaml, the Dockerfile and draft.toml, in that order.
    ///
    /// The first failing step stops the update; the returned report names that
    /// step and keeps the underlying [`PackError`]. Files rewritten by earlier
    /// steps stay rewritten. Base image pull failures are only reported.
    pub fn update_configuration(
        &self,
        request: &UpdateRequest,
    ) -> Result<UpdateReport, Report<ConfigurationError>> {
        tracing::debug!("Update configuration - start");
        let run = RunFolder::new(&request.run_folder);

        let result = self
            .modify_values_yaml(&run, request)
            .change_context(ConfigurationError::NotUpdated {
                step: UpdateStep::Values,
            })
            .and_then(|()| {
                self.modify_dockerfile(&run, request)
                    .change_context(ConfigurationError::NotUpdated {
                        step: UpdateStep::Dockerfile,
                    })
            })
            .and_then(|image_pulls| {
                self.modify_draft_toml(&run, &request.local_registry())
                    .change_context(ConfigurationError::NotUpdated {
                        step: UpdateStep::Draft,
                    })?;
                Ok(UpdateReport { image_pulls })
            })
            .attach_printable_lazy(|| format!("run folder: {}", request.run_folder.display()));

        match &result {
            Ok(report) => tracing::debug!(pull_failed = report.pull_failed(), "Update configuration - end"),
            Err(report) => tracing::error!("Update configuration - i/o error: {report:?}"),
        }
        result
    }

    pub fn modify_values_yaml(&self, run: &RunFolder, request: &UpdateRequest) -> PackResult<()> {
        let script_args = self
            .script_args
            .format(request.script_location.as_deref(), &request.script_parameters);
        let update = ValuesUpdate {
            script_args,
            experiment_name: &request.experiment_name,
            run_name: &request.run_name,
            cluster_registry_port: request.cluster_registry_port,
            pack_params: &request.pack_params,
            env_variables: &request.env_variables,
        };
        values::rewrite_values_file(&run.values_yaml(&request.pack_type), &update)
    }

    /// Rewrites the Dockerfile, then pulls every base image it now points at.
    pub fn modify_dockerfile(
        &self,
        run: &RunFolder,
        request: &UpdateRequest,
    ) -> PackResult<Vec<PullOutcome>> {
        let update = DockerfileUpdate {
            script_location: request.script_location.as_deref(),
            script_folder_location: request.script_folder_location.as_deref(),
            local_registry_port: request.local_registry_port,
            staging_dir: &self.config.staging_dir,
        };
        let base_images =
            dockerfile::rewrite_dockerfile(&run.dockerfile(), &update, &self.config.images)?;

        Ok(base_images
            .iter()
            .map(|repository| pull_best_effort(self.image_puller.as_ref(), repository))
            .collect())
    }

    pub fn modify_draft_toml(&self, run: &RunFolder, registry: &str) -> PackResult<()> {
        let namespace = self
            .namespace_source
            .current_namespace()
            .change_context(PackError::Namespace)?;
        draft::rewrite_draft_file(&run.draft_toml(), &namespace, registry)
    }
}

/// Pod count computed for a run, or `None` when the pack has no replica counts.
///
/// Read and parse errors are returned as they are.
pub fn get_pod_count(run_folder: &Path, pack_type: &str) -> PackResult<Option<i64>> {
    tracing::debug!("Getting pod count for Run: {}", run_folder.display());
    let pod_count = values::read_pod_count(&RunFolder::new(run_folder).values_yaml(pack_type))?;
    tracing::debug!("Pod count for Run: {} = {:?}", run_folder.display(), pod_count);
    Ok(pod_count)
}
