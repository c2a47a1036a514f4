use crate::ServerError;
use modsim_core::frame::{FrameCodec, MAX_FRAME_LEN};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

pub const DEFAULT_UNIT_ID: u8 = 1;
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(2);

/// Startup configuration shared read-only by every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Unit id answered on MBAP connections, besides broadcast (0).
    pub unit_id: u8,
    /// How long a session may sit without a request once it has served one.
    pub max_idle: Duration,
    /// Upper bound for a single read.
    pub max_frame_len: usize,
    /// Seed for the per-session synthetic data generators. `None` seeds
    /// each session from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            unit_id: DEFAULT_UNIT_ID,
            max_idle: DEFAULT_MAX_IDLE,
            max_frame_len: MAX_FRAME_LEN,
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn with_rng_seed(mut self, rng_seed: Option<u64>) -> Self {
        self.rng_seed = rng_seed;
        self
    }

    /// Check the configuration against the frame codec it will drive.
    pub fn validate<C: FrameCodec>(&self) -> Result<(), ServerError> {
        if self.max_frame_len < C::MIN_FRAME_LEN {
            return Err(ServerError::InvalidConfig(
                "max frame length is below the codec minimum",
            ));
        }
        if self.max_frame_len > MAX_FRAME_LEN {
            return Err(ServerError::InvalidConfig(
                "max frame length exceeds 260 bytes",
            ));
        }
        if self.max_idle.is_zero() {
            return Err(ServerError::InvalidConfig("max idle time must be non-zero"));
        }
        Ok(())
    }

    /// Generator for the `session_id`-th accepted connection.
    pub fn session_rng(&self, session_id: u64) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(session_id)),
            None => StdRng::from_entropy(),
        }
    }
}
