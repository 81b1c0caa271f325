use clap::Args;
use edge_promo::ids::StoreId;
use edge_promo_app::config::CompileConfig;
use jiff::Timestamp;
use uuid::Uuid;

use super::{Service, print_json};

#[derive(Debug, Args)]
pub(crate) struct CompileStoreArgs {
    /// Store UUID
    #[arg(long)]
    store: Uuid,
}

pub(crate) async fn store(
    service: &Service,
    config: &CompileConfig,
    args: CompileStoreArgs,
) -> Result<(), String> {
    let compilation = service
        .compile_store(
            StoreId::from_uuid(args.store),
            config.batch_options(Timestamp::now()),
        )
        .await
        .map_err(|error| format!("failed to compile store {}: {error}", args.store))?;

    print_json(&compilation)
}

pub(crate) async fn company(service: &Service, config: &CompileConfig) -> Result<(), String> {
    let compilation = service
        .compile_company(config.batch_options(Timestamp::now()))
        .await
        .map_err(|error| format!("failed to compile company: {error}"))?;

    print_json(&compilation)
}
