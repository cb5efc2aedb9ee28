use anyhow::Result;
use clap::Parser;
use tf_pack::config::Cli;
use tf_pack::config::Commands;
use tf_pack::config::PackConfig;
use tf_pack::config::PodCountArgs;
use tf_pack::config::UpdateArgs;
use tf_pack::PackConfigurator;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = utils::logging::init();
    tracing::debug!("tf-pack {}", &**version::VERSION);

    let config = PackConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Update(update_args) => run_update(config, *update_args),
        Commands::PodCount(pod_count_args) => run_pod_count(pod_count_args),
    }
}

fn run_update(mut config: PackConfig, update_args: UpdateArgs) -> Result<()> {
    update_args.overrides.clone().apply(&mut config);
    let request = update_args.to_request();

    let report = PackConfigurator::new(config)
        .update_configuration(&request)
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;

    for outcome in report.image_pulls.iter().filter(|outcome| outcome.is_failed()) {
        tracing::warn!(
            "base image {} could not be pulled",
            outcome.repository()
        );
    }
    tracing::info!(
        "Updated configuration of {} in {}",
        request.run_name,
        request.run_folder.display()
    );
    Ok(())
}

fn run_pod_count(pod_count_args: PodCountArgs) -> Result<()> {
    let pod_count = tf_pack::get_pod_count(&pod_count_args.run_folder, &pod_count_args.pack_type)
        .map_err(|e| anyhow::anyhow!("Failed to read pod count: {e:?}"))?;
    if let Some(pod_count) = pod_count {
        println!("{pod_count}");
    }
    Ok(())
}
