pub mod choice;
pub mod participant;
pub mod phase;
pub mod trial;

pub use choice::{Choice, Eye, Pair, Side, ViewingMode};
pub use participant::{Gender, Participant};
pub use phase::{PhaseWindows, TrialPhase};
pub use trial::{Codec, CompressionInfo, Region, Response, ResponseError, Trial};
