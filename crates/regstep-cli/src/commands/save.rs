use regstep_core::StepInput;
use regstep_operations::steps::SaveCustomerDataStep;
use regstep_operations::{SaveStep, StepConfig};

use super::{StepArgs, open_store, print_report, read_json, services};
use crate::error::Result;

pub(crate) fn run(args: &StepArgs, config: &StepConfig) -> Result<()> {
    let store = open_store(args.seed.as_deref())?;
    let step = SaveCustomerDataStep::new(services(&store, config), config)?;

    let input: StepInput = read_json(&args.input)?;
    let report = step.save(input)?;

    print_report(&report, &store, args.dump_store)
}
