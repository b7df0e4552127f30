//! Mount Executor: OS-level "create filesystem" and "mount" operations.
//!
//! [`Mounter`] wraps the host's formatting and mounting facilities as opaque,
//! side-effecting calls.  [`CommandMounter`] is the production implementation,
//! shelling out to `mkfs.<fs>` and `mount`; its failure output is preserved
//! verbatim so it can be surfaced to the caller unchanged.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

/// Error produced by a mount-executor call.
#[derive(Debug, Error)]
pub enum MountError {
    /// The tool could not be spawned at all (typically missing from PATH).
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// The command that could not be started.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited non-zero.
    #[error("{command} failed: {output}")]
    CommandFailed {
        /// The command that failed, with arguments.
        command: String,
        /// Combined stdout and stderr, verbatim.
        output: String,
    },

    /// Creating the mount target directory failed.
    #[error("creating mount target {path}: {source}")]
    CreateTargetDir {
        /// Directory that could not be created.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Synchronous, opaque filesystem operations on the local host.
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Create a filesystem of `fs_type` on `device`, overwriting whatever is
    /// there.
    async fn format_device(&self, device: &str, fs_type: &str) -> Result<(), MountError>;

    /// Mount `source` at `target` with the given filesystem type and options.
    /// The target directory is created if absent.
    async fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError>;
}

/// Build the argument list for `mount -t <fs> [-o a,b] <source> <target>`.
fn build_mount_args(source: &str, target: &str, fs_type: &str, options: &[String]) -> Vec<String> {
    let mut args = vec!["-t".to_owned(), fs_type.to_owned()];
    if !options.is_empty() {
        args.push("-o".to_owned());
        args.push(options.join(","));
    }
    args.push(source.to_owned());
    args.push(target.to_owned());
    args
}

/// Concatenate a finished command's stdout and stderr.
fn combined_output(output: &std::process::Output) -> String {
    let mut s = String::from_utf8_lossy(&output.stdout).into_owned();
    let err = String::from_utf8_lossy(&output.stderr);
    if !s.is_empty() && !err.is_empty() {
        s.push('\n');
    }
    s.push_str(&err);
    s
}

/// [`Mounter`] implementation that shells out to the host's tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandMounter;

impl CommandMounter {
    async fn run(program: &str, args: &[String]) -> Result<(), MountError> {
        let rendered = format!("{program} {}", args.join(" "));
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| MountError::Spawn {
                command: rendered.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(MountError::CommandFailed {
                command: rendered,
                output: combined_output(&output),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Mounter for CommandMounter {
    #[instrument(skip(self))]
    async fn format_device(&self, device: &str, fs_type: &str) -> Result<(), MountError> {
        // mkfs.ext4 -F /dev/disk/by-id/...
        let program = format!("mkfs.{fs_type}");
        let args = vec!["-F".to_owned(), device.to_owned()];
        Self::run(&program, &args).await?;
        debug!(device, fs_type, "filesystem created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError> {
        tokio::fs::create_dir_all(target)
            .await
            .map_err(|source| MountError::CreateTargetDir {
                path: target.to_owned(),
                source,
            })?;
        let args = build_mount_args(source, target, fs_type, options);
        Self::run("mount", &args).await?;
        debug!(source, target, fs_type, "mounted");
        Ok(())
    }
}
