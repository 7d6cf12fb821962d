use std::sync::Arc;

use anyhow::Result;
use extbus::builtin::{CustomItemPack, LifecycleAudit};
use extbus::{CustomItemData, CustomItemOptions, Host, config_manager};

fn main() -> Result<()> {
    extbus::init_logging();

    // Parse config path from command line arguments
    let config_path = parse_config_path();
    let config = match config_manager::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {:#}", e);
            tracing::warn!("Falling back to the default config");
            Default::default()
        }
    };
    tracing::info!("Config loaded from {}", config_path.display());

    let host = Host::new(config);
    host.load_extension(Arc::new(LifecycleAudit::new()))?;
    host.load_extension(Arc::new(CustomItemPack::new("starter-items", starter_items()?)))?;

    for item in host.start() {
        tracing::info!(
            name = item.name(),
            texture_size = item.texture_size(),
            "Custom item defined"
        );
    }

    host.shutdown("process exit");
    Ok(())
}

fn starter_items() -> Result<Vec<CustomItemData>> {
    let mut ruby = CustomItemData::new(
        "ruby",
        CustomItemOptions {
            custom_model_data: Some(1001),
            ..Default::default()
        },
    )?;
    ruby.set_display_name("Ruby");

    let mut hammer = CustomItemData::new(
        "hammer",
        CustomItemOptions {
            unbreakable: Some(true),
            ..Default::default()
        },
    )?;
    hammer.set_allow_offhand(false);
    hammer.set_texture_size(32);

    Ok(vec![ruby, hammer])
}

fn parse_config_path() -> std::path::PathBuf {
    let mut args = std::env::args().skip(1);

    // Check if user specified a custom config path via --config flag
    while let Some(flag) = args.next() {
        if flag == "--config" {
            if let Some(value) = args.next() {
                return std::path::PathBuf::from(value);
            }
        }
    }

    // No custom config specified, use user data directory
    match config_manager::initialize_user_config() {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("Failed to initialize user config: {}", e);
            let fallback = config_manager::fallback_config_path();
            if let Err(err) = config_manager::write_default_config(&fallback) {
                tracing::warn!(
                    "Failed to create fallback config at {}: {:#}",
                    fallback.display(),
                    err
                );
            }
            tracing::warn!("Falling back to {}", fallback.display());
            fallback
        }
    }
}
