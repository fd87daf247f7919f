use regstep_core::StepInput;
use regstep_operations::steps::UpdateCustomerDataStep;
use regstep_operations::{SaveStep, StepConfig};
use tracing::warn;

use super::{StepArgs, open_store, print_report, read_json, services};
use crate::error::Result;

pub(crate) fn run(args: &StepArgs, config: &StepConfig) -> Result<()> {
    if args.seed.is_none() {
        warn!("updating without --seed; the store starts empty");
    }
    let store = open_store(args.seed.as_deref())?;
    let step = UpdateCustomerDataStep::new(services(&store, config), config)?;

    let input: StepInput = read_json(&args.input)?;
    let report = step.save(input)?;

    print_report(&report, &store, args.dump_store)
}
