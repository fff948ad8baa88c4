/*!
Input sequencing driver.

The core of the crate: an ordered list of [`ActionStep`]s is executed by a
[`SequenceRunner`] against host [`InputPrimitives`], with a
[`CancellationToken`] checked between steps and a [`ReadinessProbe`] consulted
by `WaitUntilReady` steps.

- `keys`:   symbolic key registry (`ENTER`, `CTRL+HOME`, `DOWN*3`, ...)
- `step`:   `ActionStep`, `Sequence`, construction-time validation
- `token`:  atomic kill switch
- `probe`:  readiness probes
- `host`:   injected platform primitives
- `result`: per-step outcomes and `RunResult`
- `runner`: the step state machine

```no_run
use keypilot::driver::*;

let seq = Sequence::new(vec![
    ActionStep::focus_window("Fourth Shift"),
    ActionStep::send_text("ABC"),
    ActionStep::send_key("ENTER")?,
])?;
let mut host = FnPrimitives::new(|_title: &str| true, |_payload: &KeyPayload<'_>| true);
let result = SequenceRunner::default().execute(
    &seq,
    &CancellationToken::new(),
    &mut host,
    &mut GracePeriodProbe::new(),
);
assert!(result.is_success());
# Ok::<(), keypilot::driver::StepError>(())
```
*/

pub mod host;
pub mod keys;
pub mod probe;
pub mod result;
pub mod runner;
pub mod step;
pub mod token;

pub use host::{FnPrimitives, InputPrimitives, KeyPayload};
pub use keys::{KeyCombo, Modifiers, NamedKey};
pub use probe::{AlwaysReady, GracePeriodProbe, ReadinessProbe};
pub use result::{RunResult, RunState, StepFailure, StepOutcome, StepStatus};
pub use runner::{RunnerOptions, SequenceRunner};
pub use step::{ActionStep, Sequence, SequenceBuilder, StepError, StepRules};
pub use token::CancellationToken;
