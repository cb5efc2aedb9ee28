use std::path::PathBuf;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use utils::version;

use crate::config::PackConfig;
use crate::configurator::UpdateRequest;

#[derive(Parser)]
#[command(about, long_about = None, version = &**version::VERSION)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "TF_PACK_CONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "YAML file with image names and runtime settings"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rewrite Dockerfile, values.yaml and draft.toml of a run folder
    Update(Box<UpdateArgs>),
    /// Print the pod count computed for a run
    #[command(name = "pod-count")]
    PodCount(PodCountArgs),
}

/// Command line values that take precedence over the configuration file.
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigOverrides {
    #[arg(long, env = "TF_PACK_PY2_IMAGE", help = "Python 2 training image name")]
    pub py2_image: Option<String>,

    #[arg(long, env = "TF_PACK_PY3_IMAGE", help = "Python 3 training image name")]
    pub py3_image: Option<String>,

    #[arg(long, env = "TF_PACK_STAGING_DIR", help = "Staging directory copied into the image")]
    pub staging_dir: Option<String>,

    #[arg(
        long,
        env = "TF_PACK_DOCKER",
        value_hint = clap::ValueHint::ExecutablePath,
        help = "Container runtime client used to pull the base image"
    )]
    pub docker_binary: Option<PathBuf>,

    #[arg(
        long,
        env = "TF_PACK_KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to KUBECONFIG or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(long, help = "Namespace to deploy to instead of the current kube context's")]
    pub namespace: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut PackConfig) {
        if let Some(py2_image) = self.py2_image {
            config.images.py2_image_name = py2_image;
        }
        if let Some(py3_image) = self.py3_image {
            config.images.py3_image_name = py3_image;
        }
        if let Some(staging_dir) = self.staging_dir {
            config.staging_dir = staging_dir;
        }
        if let Some(docker_binary) = self.docker_binary {
            config.docker_binary = docker_binary;
        }
        if self.kubeconfig.is_some() {
            config.kubeconfig = self.kubeconfig;
        }
        if self.namespace.is_some() {
            config.namespace = self.namespace;
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct UpdateArgs {
    #[arg(long, value_hint = clap::ValueHint::DirPath, help = "Run folder created from the pack template")]
    pub run_folder: PathBuf,

    #[arg(long, help = "Location of the training script")]
    pub script_location: Option<String>,

    #[arg(long, help = "Folder with additional experiment files")]
    pub script_folder_location: Option<String>,

    #[arg(long)]
    pub experiment_name: String,

    #[arg(long)]
    pub run_name: String,

    #[arg(long, env = "TF_PACK_LOCAL_REGISTRY_PORT", help = "Port of the local registry tunnel")]
    pub local_registry_port: u16,

    #[arg(long, env = "TF_PACK_CLUSTER_REGISTRY_PORT", help = "Port of the in-cluster registry")]
    pub cluster_registry_port: u16,

    #[arg(long, default_value = "tf-training", help = "Chart directory under charts/")]
    pub pack_type: String,

    #[arg(
        short = 'p',
        long = "pack-param",
        num_args = 2,
        value_names = ["KEY", "VALUE"],
        action = ArgAction::Append,
        help = "Value to set in values.yaml; KEY may be a dotted path"
    )]
    pub pack_params: Vec<String>,

    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", help = "Environment variable for the training pods")]
    pub env_variables: Vec<String>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Parameters passed to the training script
    #[arg(last = true)]
    pub script_parameters: Vec<String>,
}

impl UpdateArgs {
    /// Pairs up the flat `-p KEY VALUE` occurrences in input order.
    pub fn pack_param_pairs(&self) -> Vec<(String, String)> {
        self.pack_params
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }

    pub fn to_request(&self) -> UpdateRequest {
        UpdateRequest {
            run_folder: self.run_folder.clone(),
            script_location: non_empty(&self.script_location),
            script_parameters: self.script_parameters.clone(),
            experiment_name: self.experiment_name.clone(),
            run_name: self.run_name.clone(),
            local_registry_port: self.local_registry_port,
            cluster_registry_port: self.cluster_registry_port,
            pack_type: self.pack_type.clone(),
            pack_params: self.pack_param_pairs(),
            script_folder_location: non_empty(&self.script_folder_location),
            env_variables: self.env_variables.clone(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|value| !value.is_empty())
}

#[derive(Parser, Clone, Debug)]
pub struct PodCountArgs {
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub run_folder: PathBuf,

    #[arg(long, default_value = "tf-training")]
    pub pack_type: String,
}
