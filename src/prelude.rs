pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};

pub use crate::config::Config;
pub use crate::error::BridgeError;
pub use crate::options::Options;
