//! Log sink setup
//!
//! Library code hanya memanggil macro `tracing`. Binary memasang subscriber
//! sekali lewat [`init`].

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Default log file, relatif terhadap working directory
pub const DEFAULT_LOG_FILE: &str = "log/sparrow.log";

/// Pasang `tracing_subscriber::fmt` sebagai global subscriber.
///
/// `RUST_LOG` meng-override `level`. Jika `log_file` diberikan, event ditulis
/// (append) ke file tersebut, direktori induk dibuat bila belum ada.
/// Memanggil lebih dari sekali tidak panic, subscriber pertama tetap dipakai.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    let installed = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    fs::create_dir_all(dir)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.try_init(),
    };

    if installed.is_err() {
        tracing::debug!("global subscriber already installed, keeping it");
    }
    Ok(())
}
