//src/presenter.rs
use std::io::{self, BufRead, Write};
use tracing::warn;

/// What the update flow needs from the user interface.
pub trait Presenter {
    fn show_message(&mut self, text: &str) -> io::Result<()>;
    fn ask_yes_no(&mut self, question: &str) -> io::Result<bool>;
    fn open_link(&mut self, url: &str, message: &str) -> io::Result<()>;
}

/// Presenter for a terminal: prints to the output, reads answers from the input.
pub struct TerminalPresenter<R, W> {
    input: R,
    output: W,
    open_browser: bool,
}

impl TerminalPresenter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio(open_browser: bool) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), open_browser)
    }
}

impl<R: BufRead, W: Write> TerminalPresenter<R, W> {
    pub const fn new(input: R, output: W, open_browser: bool) -> Self {
        Self {
            input,
            output,
            open_browser,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Presenter for TerminalPresenter<R, W> {
    fn show_message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")?;
        self.output.flush()
    }

    fn ask_yes_no(&mut self, question: &str) -> io::Result<bool> {
        write!(self.output, "{question} (Y/N): ")?;
        self.output.flush()?;

        let mut input = String::new();
        self.input.read_line(&mut input)?;
        let answer = input.trim();
        Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }

    fn open_link(&mut self, url: &str, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")?;
        if self.open_browser {
            match open::that(url) {
                Ok(()) => return self.output.flush(),
                Err(e) => warn!("Failed to open {} in a browser: {}", url, e),
            }
        }
        writeln!(self.output, "{url}")?;
        self.output.flush()
    }
}
