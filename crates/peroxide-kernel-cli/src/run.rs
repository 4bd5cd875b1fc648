//! Run command implementation.
//!
//! Starts the interpreter, waits for its first prompt, then serves the
//! Jupyter sockets until shutdown.

use std::path::PathBuf;
use std::time::Duration;

use peroxide_kernel_core::{
    AdapterConfig, InteractiveProcessAdapter, InterpreterConfig, Transport, find_interpreter,
};
use peroxide_kernel_server::{ConnectionInfo, KernelServer};

/// Options of `peroxide-kernel run`.
#[derive(Debug)]
pub struct RunOptions {
    pub connection_file: PathBuf,
    pub interpreter: Option<PathBuf>,
    /// Replaces the default interpreter arguments when non-empty.
    pub args: Vec<String>,
    pub pipe: bool,
    pub timeout_secs: Option<u64>,
}

impl RunOptions {
    fn adapter_config(&self, program: PathBuf) -> AdapterConfig {
        let mut interpreter = InterpreterConfig::new(program);
        if !self.args.is_empty() {
            interpreter = interpreter.with_args(self.args.iter().cloned());
        }
        if self.pipe {
            interpreter = interpreter.with_transport(Transport::Pipe);
        }

        AdapterConfig::new(interpreter).with_timeout(self.timeout_secs.map(Duration::from_secs))
    }
}

/// Start the kernel.
pub async fn execute(options: RunOptions) -> anyhow::Result<()> {
    let connection = ConnectionInfo::from_file(&options.connection_file)?;
    let program = find_interpreter(options.interpreter.clone())?;
    let config = options.adapter_config(program);

    tracing::info!(
        "Starting interpreter {}",
        config.interpreter.program.display()
    );

    // Spawning blocks until the first prompt
    let adapter =
        tokio::task::spawn_blocking(move || InteractiveProcessAdapter::spawn(&config)).await??;

    KernelServer::new(connection, adapter)?.run().await?;
    Ok(())
}
