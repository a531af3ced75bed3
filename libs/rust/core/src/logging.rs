//! Log bootstrap: a stdout layer plus five per-concern file sinks.
//!
//! Events are routed by tracing target: `general`, `autoscaler`,
//! `threshold` and `cdt` each land in their own file, and every ERROR-level
//! event (whatever its target) also lands in `error.log`. Lines are plain
//! `<timestamp> <level> <message>`.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::HpaError;

static LOG_INIT: OnceCell<()> = OnceCell::new();

pub fn init_logging(dir: &Path) -> Result<(), HpaError> {
    LOG_INIT.get_or_try_init(|| -> Result<(), HpaError> {
        fs::create_dir_all(dir)
            .map_err(|e| HpaError::Config(format!("log dir {}: {e}", dir.display())))?;

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_filter(EnvFilter::from_default_env())
                .boxed(),
        );
        for (file, target) in [
            ("general.log", "general"),
            ("autoscaler.log", "autoscaler"),
            ("threshold.log", "threshold"),
            ("CDT.log", "cdt"),
        ] {
            layers.push(
                sink_layer(dir, file)?
                    .with_filter(Targets::new().with_target(target, LevelFilter::INFO))
                    .boxed(),
            );
        }
        layers.push(sink_layer(dir, "error.log")?.with_filter(LevelFilter::ERROR).boxed());

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| HpaError::Config(format!("tracing init: {e}")))?;
        Ok(())
    })?;
    Ok(())
}

fn sink_layer(
    dir: &Path,
    file: &str,
) -> Result<
    tracing_subscriber::fmt::Layer<
        Registry,
        tracing_subscriber::fmt::format::DefaultFields,
        tracing_subscriber::fmt::format::Format,
        Arc<File>,
    >,
    HpaError,
> {
    let handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(file))
        .map_err(|e| HpaError::Config(format!("open {file}: {e}")))?;
    Ok(tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Arc::new(handle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let dir = std::env::temp_dir().join("hpa-core-log-test");
        init_logging(&dir).unwrap();
        init_logging(&dir).unwrap();
        for name in ["general.log", "autoscaler.log", "threshold.log", "CDT.log", "error.log"] {
            assert!(dir.join(name).exists(), "{name} missing");
        }
    }
}
