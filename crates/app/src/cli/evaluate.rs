use clap::Args;
use edge_promo_app::service::EvaluateRequest;
use jiff::Timestamp;

use super::{Service, print_json};

#[derive(Debug, Args)]
pub(crate) struct EvaluateArgs {
    /// Bill key in the fixture set
    #[arg(long)]
    bill: String,

    /// Customer key in the fixture set
    #[arg(long)]
    customer: Option<String>,

    /// Count applied promotions in the in-memory ledger and report the redemption
    #[arg(long)]
    settle: bool,
}

pub(crate) async fn run(service: &Service, args: EvaluateArgs) -> Result<(), String> {
    let request = EvaluateRequest {
        bill: args.bill,
        customer: args.customer,
        compiled_at: Timestamp::now(),
    };

    if args.settle {
        let settled = service
            .settle(&request)
            .await
            .map_err(|error| format!("failed to settle bill {}: {error}", request.bill))?;

        return print_json(&settled);
    }

    let evaluation = service
        .evaluate(&request)
        .await
        .map_err(|error| format!("failed to evaluate bill {}: {error}", request.bill))?;

    print_json(&evaluation)
}
