//! Peroxide Kernel CLI - Jupyter kernel for Peroxide Scheme.

mod install;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "peroxide-kernel")]
#[command(about = "Jupyter kernel for Peroxide Scheme")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the kernel (launched by Jupyter)
    Run {
        /// Connection file written by the notebook front-end
        #[arg(short = 'f', long)]
        connection_file: PathBuf,

        /// Path to the peroxide REPL binary
        #[arg(long)]
        interpreter: Option<PathBuf>,

        /// Argument passed to the interpreter, repeatable (default: --no-readline)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Talk to the interpreter over pipes instead of a pseudo-terminal
        #[arg(long)]
        pipe: bool,

        /// Give up when the interpreter shows no prompt for this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Install the kernelspec so Jupyter can find this kernel
    Install {
        /// Install into the per-user Jupyter data directory
        #[arg(long, conflicts_with = "prefix")]
        user: bool,

        /// Install under PREFIX/share/jupyter
        #[arg(long)]
        prefix: Option<PathBuf>,

        /// Kernelspec directory name
        #[arg(long, default_value = install::DEFAULT_KERNEL_NAME)]
        name: String,

        /// Path to the peroxide REPL binary, recorded in the kernelspec
        #[arg(long)]
        interpreter: Option<PathBuf>,
    },

    /// Print the kernelspec JSON
    Spec {
        /// Path to the peroxide REPL binary, recorded in the kernelspec
        #[arg(long)]
        interpreter: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging. stdout stays clean for `spec`.
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format kernel errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<peroxide_kernel_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else if let Some(peroxide_kernel_server::ServerError::Core(core_err)) =
            err.downcast_ref::<peroxide_kernel_server::ServerError>()
        {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            connection_file,
            interpreter,
            args,
            pipe,
            timeout_secs,
        } => {
            let options = run::RunOptions {
                connection_file,
                interpreter,
                args,
                pipe,
                timeout_secs,
            };
            run::execute(options).await.map_err(format_error)?;
        }

        Commands::Install {
            user,
            prefix,
            name,
            interpreter,
        } => {
            let target = match prefix {
                Some(prefix) => install::Target::Prefix(prefix),
                None if user => install::Target::User,
                None => install::Target::System,
            };
            let dir = install::execute(target, &name, interpreter.as_deref())?;
            println!("Installed kernelspec {} in {}", name, dir.display());
        }

        Commands::Spec { interpreter } => {
            let spec = install::KernelSpec::for_current_exe(interpreter.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&spec)?);
        }
    }

    Ok(())
}
