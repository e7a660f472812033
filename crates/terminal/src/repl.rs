//! The read-eval-print loop.

use crossterm::tty::IsTty;
use palaver_core::{Command, SessionController};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::debug;

/// Interactive terminal chat over any line-based input and writable output.
pub struct Terminal<R, W> {
    input: R,
    output: W,
    hide_secrets: bool,
}

impl Terminal<BufReader<Stdin>, Stdout> {
    /// A terminal wired to the process's stdin and stdout.
    ///
    /// Secrets are read with echo off when stdin is an interactive console.
    pub fn stdio() -> Self {
        let mut term = Self::new(BufReader::new(io::stdin()), io::stdout());
        term.hide_secrets = std::io::stdin().is_tty();
        term
    }
}

impl<R, W> Terminal<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            hide_secrets: false,
        }
    }

    /// Write `text` as-is and flush.
    pub async fn write(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await
    }

    pub async fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.write(&format!("{text}\n")).await
    }

    /// Show `prompt`, then read one line. `None` at end of input.
    ///
    /// Bytes that are not valid UTF-8 become U+FFFD instead of failing the read.
    pub async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.write(prompt).await?;
        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Like [`read_line`](Self::read_line), but typed characters are not
    /// echoed when attached to a console.
    pub async fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        if !self.hide_secrets {
            return self.read_line(prompt).await;
        }
        self.write(prompt).await?;
        let line = tokio::task::spawn_blocking(crate::secret::read_hidden_line)
            .await
            .map_err(io::Error::other)??;
        self.write("\n").await?;
        Ok(line)
    }

    /// Run the chat loop until `quit`, `exit` or end of input.
    pub async fn run(&mut self, session: &mut SessionController) -> io::Result<()> {
        self.write_line("Palaver chat").await?;
        self.write_line("Type 'quit' to exit, 'clear' to clear history").await?;
        self.write_line(&"-".repeat(50)).await?;

        loop {
            let Some(line) = self.read_line("\nYou: ").await? else {
                debug!("End of input, leaving chat loop");
                self.write_line("\nGoodbye!").await?;
                break;
            };

            match Command::parse(&line) {
                Command::Empty => continue,
                Command::Quit => {
                    self.write_line("Goodbye!").await?;
                    break;
                }
                Command::Clear => {
                    session.clear();
                    self.write_line("Chat history cleared.").await?;
                }
                Command::Submit(text) => {
                    self.write("Thinking...").await?;
                    let result = session.submit(&text).await;
                    self.write("\r           \r").await?;
                    match result {
                        Ok(Some(reply)) => self.write_line(&format!("\nAssistant: {reply}")).await?,
                        Ok(None) => {}
                        Err(e) => self.write_line(&format!("Error: {e}")).await?,
                    }
                }
            }
        }

        Ok(())
    }

    /// Give back the output, e.g. to inspect what was written.
    pub fn into_output(self) -> W {
        self.output
    }
}
