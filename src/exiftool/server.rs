//! The coprocess server itself.

use super::splitter::{ObjectCodec, ReadyTokenCodec};
use super::{ServerConfig, EXECUTE, READY_MARKER};
use crate::error::{Error, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;

/// A long-lived ExifTool instance processing commands sequentially.
///
/// Servers avoid the overhead of loading ExifTool for each command and are
/// safe for concurrent use. Two locks implement the dispatch discipline:
/// the *command* lock serialises requests and guards the stdio handles, the
/// *server* lock serialises restart/close and guards the process handle.
/// A restart takes only the server lock, so an in-flight command observes
/// its own I/O failure first.
///
/// # Example
///
/// ```rust,ignore
/// let server = Server::new(ServerConfig::default(), &[]).await?;
/// let version = server.command(&["-ver"]).await?;
/// server.shutdown().await?;
/// ```
pub struct Server {
    exec: PathBuf,
    args: Vec<String>,
    output: Option<kanal::AsyncSender<String>>,
    /// Command lock.
    io: Mutex<IoState>,
    /// Server lock.
    proc: Mutex<ProcState>,
}

enum StdoutFrames {
    Buffered(FramedRead<ChildStdout, ReadyTokenCodec>),
    Streamed(FramedRead<ChildStdout, ObjectCodec>),
}

struct IoState {
    /// Taken by [`Server::shutdown`]; `None` means the server is done.
    stdin: Option<ChildStdin>,
    stdout: StdoutFrames,
    stderr: Lines<BufReader<ChildStderr>>,
}

struct ProcState {
    child: Option<Child>,
    done: bool,
}

fn eof_error() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "exiftool closed its pipe",
    ))
}

impl Server {
    /// Load a new instance in buffered mode: each [`Server::command`] call
    /// returns the command's whole stdout.
    pub async fn new(config: ServerConfig, common_args: &[&str]) -> Result<Server> {
        Self::start_internal(config, common_args, None).await
    }

    /// Load a new instance in streamed mode: tokens are forwarded on
    /// `output` object by object as [`Server::command_streamed`] decodes
    /// them.
    pub async fn with_output(
        config: ServerConfig,
        common_args: &[&str],
        output: kanal::AsyncSender<String>,
    ) -> Result<Server> {
        Self::start_internal(config, common_args, Some(output)).await
    }

    async fn start_internal(
        config: ServerConfig,
        common_args: &[&str],
        output: Option<kanal::AsyncSender<String>>,
    ) -> Result<Server> {
        let mut args = Vec::new();
        if let Some(arg1) = &config.arg1 {
            args.push(arg1.clone());
        }
        if let Some(file) = &config.config_file {
            args.push("-config".to_string());
            args.push(file.display().to_string());
        }
        args.extend(
            [
                "-stay_open",
                "true",
                "-@",
                "-",
                "-common_args",
                "-echo4",
                READY_MARKER,
                "-charset",
                "filename=utf8",
            ]
            .map(String::from),
        );
        args.extend(common_args.iter().map(|a| a.to_string()));

        let (child, io) = Self::spawn(&config.exec, &args, output.is_some())?;
        Ok(Server {
            exec: config.exec,
            args,
            output,
            io: Mutex::new(io),
            proc: Mutex::new(ProcState {
                child: Some(child),
                done: false,
            }),
        })
    }

    fn spawn(exec: &Path, args: &[String], streamed: bool) -> Result<(Child, IoState)> {
        let mut child = Command::new(exec)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(eof_error)?;
        let stdout = child.stdout.take().ok_or_else(eof_error)?;
        let stderr = child.stderr.take().ok_or_else(eof_error)?;

        let stdout = if streamed {
            StdoutFrames::Streamed(FramedRead::new(stdout, ObjectCodec))
        } else {
            StdoutFrames::Buffered(FramedRead::new(stdout, ReadyTokenCodec))
        };

        Ok((
            child,
            IoState {
                stdin: Some(stdin),
                stdout,
                stderr: BufReader::new(stderr).lines(),
            },
        ))
    }

    async fn write_request(stdin: &mut ChildStdin, args: &[&str]) -> std::io::Result<()> {
        let mut buf = String::new();
        for arg in args {
            buf.push_str(arg);
            buf.push('\n');
        }
        buf.push_str(EXECUTE);
        buf.push('\n');
        stdin.write_all(buf.as_bytes()).await?;
        stdin.flush().await
    }

    /// Kill and replace the child under the server lock.
    ///
    /// No-op once the server has been closed or shut down. A failure to
    /// start the replacement is returned immediately rather than left for
    /// the next command to discover.
    async fn restart(&self, io: &mut IoState) -> Result<()> {
        let mut proc = self.proc.lock().await;
        if proc.done {
            return Ok(());
        }
        if let Some(child) = proc.child.as_mut() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        let (child, fresh) = Self::spawn(&self.exec, &self.args, self.output.is_some())?;
        proc.child = Some(child);
        *io = fresh;
        Ok(())
    }

    /// Restart after a dispatch failure, keeping the originating error
    /// unless the restart itself fails to spawn.
    async fn recover(&self, io: &mut IoState, err: Error) -> Error {
        match self.restart(io).await {
            Ok(()) => err,
            Err(restart_err) => restart_err,
        }
    }

    /// Run a command and return its stdout.
    ///
    /// Commands should neither read from stdin nor write binary data to
    /// stdout. Returns [`Error::Protocol`] on a server constructed in
    /// streamed mode, without touching the child.
    pub async fn command(&self, args: &[&str]) -> Result<Vec<u8>> {
        if self.output.is_some() {
            return Err(Error::Protocol(
                "streamed server: use command_streamed instead",
            ));
        }

        let mut io = self.io.lock().await;
        {
            let Some(stdin) = io.stdin.as_mut() else {
                return Err(Error::Closed);
            };
            if let Err(e) = Self::write_request(stdin, args).await {
                return Err(self.recover(&mut io, e.into()).await);
            }
        }

        let frame = match &mut io.stdout {
            StdoutFrames::Buffered(frames) => frames.next().await,
            StdoutFrames::Streamed(_) => {
                return Err(Error::Protocol(
                    "streamed server: use command_streamed instead",
                ))
            }
        };
        let out = match frame {
            Some(Ok(frame)) if !frame.eof => frame.bytes,
            Some(Ok(_)) | None => return Err(self.recover(&mut io, eof_error()).await),
            Some(Err(e)) => return Err(self.recover(&mut io, e).await),
        };

        match io.stderr.next_line().await {
            Ok(Some(line)) => {
                let msg = line.trim();
                if !msg.is_empty() && msg != READY_MARKER {
                    return Err(Error::ExifTool(msg.to_string()));
                }
            }
            Ok(None) => return Err(self.recover(&mut io, eof_error()).await),
            Err(e) => return Err(self.recover(&mut io, e.into()).await),
        }

        Ok(out.to_vec())
    }

    /// Run a command, forwarding its stdout token by token on the output
    /// channel supplied at construction.
    ///
    /// Diagnostics are forwarded on the same channel: stderr lines other
    /// than the ready-marker prefixed with `err exiftool stderr: `, stdout
    /// scanner errors with `err exiftool stdout: `. Returns
    /// [`Error::Protocol`] on a server constructed in buffered mode.
    pub async fn command_streamed(&self, args: &[&str]) -> Result<()> {
        let Some(output) = &self.output else {
            return Err(Error::Protocol("buffered server: use command instead"));
        };

        let mut io = self.io.lock().await;
        {
            let Some(stdin) = io.stdin.as_mut() else {
                return Err(Error::Closed);
            };
            if let Err(e) = Self::write_request(stdin, args).await {
                return Err(self.recover(&mut io, e.into()).await);
            }
        }

        loop {
            let frame = match &mut io.stdout {
                StdoutFrames::Streamed(frames) => frames.next().await,
                StdoutFrames::Buffered(_) => {
                    return Err(Error::Protocol("buffered server: use command instead"))
                }
            };
            match frame {
                Some(Ok(frame)) => {
                    if !frame.text.is_empty() {
                        let _ = output.send(frame.text).await;
                    }
                    if frame.last {
                        break;
                    }
                }
                Some(Err(e)) => {
                    let _ = output.send(format!("err exiftool stdout: {e}")).await;
                    return Err(self.recover(&mut io, e).await);
                }
                None => {
                    let e = eof_error();
                    let _ = output.send(format!("err exiftool stdout: {e}")).await;
                    return Err(self.recover(&mut io, e).await);
                }
            }
        }

        loop {
            match io.stderr.next_line().await {
                Ok(Some(line)) => {
                    if line == READY_MARKER {
                        break;
                    }
                    if !line.is_empty() {
                        let _ = output.send(format!("err exiftool stderr: {line}")).await;
                    }
                }
                Ok(None) => {
                    let e = eof_error();
                    let _ = output.send(format!("err exiftool stderr: {e}")).await;
                    return Err(self.recover(&mut io, e).await);
                }
                Err(e) => {
                    let _ = output.send(format!("err exiftool stderr: {e}")).await;
                    return Err(self.recover(&mut io, e.into()).await);
                }
            }
        }

        Ok(())
    }

    /// Cause the child to exit immediately, without waiting.
    ///
    /// Idempotent: closing an already-closed server returns `Ok`.
    pub async fn close(&self) -> Result<()> {
        let mut proc = self.proc.lock().await;
        if proc.done {
            return Ok(());
        }
        proc.done = true;
        if let Some(child) = proc.child.as_mut() {
            child.start_kill()?;
        }
        Ok(())
    }

    /// Gracefully shut the child down without interrupting any in-flight
    /// command, wait for it to exit, and return its exit status.
    ///
    /// Further commands, and a second shutdown, fail with
    /// [`Error::Closed`].
    pub async fn shutdown(&self) -> Result<ExitStatus> {
        let mut io = self.io.lock().await;
        let Some(mut stdin) = io.stdin.take() else {
            return Err(Error::Closed);
        };

        // errors here mean the child is already gone; wait() tells the truth
        let _ = stdin.write_all(b"-stay_open\nfalse\n").await;
        let _ = stdin.flush().await;
        let _ = stdin.shutdown().await;
        drop(stdin);

        let mut proc = self.proc.lock().await;
        proc.done = true;
        let Some(child) = proc.child.as_mut() else {
            return Err(Error::Closed);
        };
        Ok(child.wait().await?)
    }
}
