pub mod classifier;
pub mod codeforces;
pub mod definition;
pub mod error;
pub mod poller;
pub mod provider;
pub mod session;
pub mod token;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use classifier::{SessionState, SubmissionOutcome};
pub use codeforces::Codeforces;
pub use definition::*;
pub use error::{JudgeError, TransportError};
pub use poller::{PollConfig, PollTarget, Verdict, VerdictPoller, VerdictState};
pub use session::SubmissionSession;
pub use token::TokenExtractor;
