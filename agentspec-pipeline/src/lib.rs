//! The pipeline DAG executor: turns a `Pipeline` resource's `step` list
//! into dependency layers and runs each layer concurrently, cancelling the
//! rest of the run the moment any step in a layer fails.

mod executor;

pub use executor::{layer_steps, PipelineExecutor, PipelineStatus, StepOutcome, StepRunner, StepStatus};
