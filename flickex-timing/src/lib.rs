pub mod clock;
pub mod manual;
pub mod timer;

pub use clock::{IntervalClock, Stopwatch};
pub use manual::ManualTimer;
pub use timer::{FrameTimes, FrameTimingStats, HighPrecisionTimer, Timer};
