use crate::cli::StressCli;
use crate::duration::StressDuration;

/// The CLI intent could not be turned into a valid run plan. Reported before anything is
/// spawned.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("Invalid stress plan: {msg}")]
pub struct InvalidPlanSpec {
    pub msg: String,
}

impl InvalidPlanSpec {
    fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// One planned stress run. Created before execution starts, consumed exactly once by the
/// process runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptor {
    /// Ordinal position in the plan. Results are reported in this order.
    pub index: usize,
    pub duration: StressDuration,
    pub container_name: String,
}

/// The ordered set of runs to execute. Built once from CLI intent and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    descriptors: Vec<RunDescriptor>,
}

impl RunPlan {
    /// `count` runs sharing the same duration.
    pub fn uniform(
        count: usize,
        duration: StressDuration,
        container_name: &str,
    ) -> Result<Self, InvalidPlanSpec> {
        if count == 0 {
            return Err(InvalidPlanSpec::new(
                "Number of runs must be a positive integer",
            ));
        }
        Ok(Self {
            descriptors: (0..count)
                .map(|index| RunDescriptor {
                    index,
                    duration,
                    container_name: container_name.to_string(),
                })
                .collect(),
        })
    }

    /// One run per duration token, in the given order. A single-element list is a valid
    /// one-run plan.
    pub fn explicit(tokens: &[String], container_name: &str) -> Result<Self, InvalidPlanSpec> {
        if tokens.is_empty() {
            return Err(InvalidPlanSpec::new("No durations given"));
        }
        let descriptors = tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                let duration = token
                    .parse::<StressDuration>()
                    .map_err(|e| InvalidPlanSpec::new(e.to_string()))?;
                Ok(RunDescriptor {
                    index,
                    duration,
                    container_name: container_name.to_string(),
                })
            })
            .collect::<Result<Vec<_>, InvalidPlanSpec>>()?;
        Ok(Self { descriptors })
    }

    /// Build the plan from CLI intent. Exactly one of the two plan modes must be present.
    pub fn from_cli(cli: &StressCli) -> Result<Self, InvalidPlanSpec> {
        match (&cli.number_of_runs_and_duration, &cli.durations) {
            (Some(pair), None) => {
                // clap guarantees two values for this flag
                let count = pair[0].parse::<usize>().map_err(|_| {
                    InvalidPlanSpec::new("Number of runs must be a positive integer")
                })?;
                let duration = pair[1]
                    .parse::<StressDuration>()
                    .map_err(|e| InvalidPlanSpec::new(e.to_string()))?;
                Self::uniform(count, duration, &cli.container_name)
            }
            (None, Some(tokens)) => Self::explicit(tokens, &cli.container_name),
            _ => Err(InvalidPlanSpec::new(
                "Expected only ONE of two arguments (--number-of-runs-and-duration OR --durations)",
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[RunDescriptor] {
        &self.descriptors
    }

    pub fn into_descriptors(self) -> Vec<RunDescriptor> {
        self.descriptors
    }

    /// Duration tokens in plan order, for the report and its fingerprint.
    pub fn duration_tokens(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .map(|d| d.duration.to_string())
            .collect()
    }
}
