use crate::transport::FRAME_HEADER_LENGTH;
use std::convert::TryFrom;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct ReplicatorOptions {
    pub heartbeat_interval: Option<Duration>,
    pub reply_timeout: Option<Duration>,
    pub max_resend_length: Option<usize>,
    /// Seeds the election timeouts. Leave unset outside of tests and simulations.
    pub random_seed: Option<u64>,
}

pub(super) struct ReplicatorOptionsValidated {
    pub heartbeat_interval: Duration,
    pub reply_timeout: Duration,
    pub max_resend_length: usize,
    pub random_seed: Option<u64>,
}

impl ReplicatorOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.reply_timeout == Duration::from_millis(0) {
            return Err("Reply timeout must be greater than zero");
        }
        if self.heartbeat_interval >= self.reply_timeout {
            return Err("Reply timeout must be greater than leader's heartbeat interval");
        }
        if self.max_resend_length <= FRAME_HEADER_LENGTH {
            return Err("Maximum resend length must leave room for at least one frame");
        }

        Ok(())
    }
}

impl TryFrom<ReplicatorOptions> for ReplicatorOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ReplicatorOptions) -> Result<Self, Self::Error> {
        let values = ReplicatorOptionsValidated {
            heartbeat_interval: options.heartbeat_interval.unwrap_or(Duration::from_millis(500)),
            reply_timeout: options.reply_timeout.unwrap_or(Duration::from_millis(2000)),
            max_resend_length: options.max_resend_length.unwrap_or(64 * 1024),
            random_seed: options.random_seed,
        };

        values.validate()?;
        Ok(values)
    }
}
