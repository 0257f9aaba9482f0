//! S2I publisher: hands the packaged application to an OpenShift binary build.

use crate::step::{Step, StepPhase};

pub const PUBLISHER: Step = Step::new("s2i/publisher", StepPhase::ApplicationPublish);

pub const STEPS: &[Step] = &[PUBLISHER];
