//! Progress display on stderr.

use epromctl::{NoProgress, Progress};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::trace;
use std::io::{self, Write};

use crate::{Cli, use_fancy_output};

/// One `#` per mark, broken into lines.
pub(crate) struct HashMarks<W: Write> {
    out: W,
    line_open: bool,
}

impl<W: Write> HashMarks<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            out,
            line_open: false,
        }
    }

    // Progress output is best effort; a closed stderr must not abort a transfer
    fn emit(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes).and_then(|()| self.out.flush()) {
            trace!("Progress output dropped: {e}");
        }
    }
}

impl<W: Write> Progress for HashMarks<W> {
    fn begin(&mut self, _total_marks: usize) {}

    fn mark(&mut self) {
        self.emit(b"#");
        self.line_open = true;
    }

    fn newline(&mut self) {
        self.emit(b"\n");
        self.line_open = false;
    }

    fn finish(&mut self) {
        if self.line_open {
            self.newline();
        }
    }
}

/// Progress bar with one step per mark.
pub(crate) struct Bar {
    bar: ProgressBar,
}

impl Bar {
    fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Progress for Bar {
    fn begin(&mut self, total_marks: usize) {
        let bar = ProgressBar::new(total_marks as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar = bar;
    }

    fn mark(&mut self) {
        self.bar.inc(1);
    }

    fn newline(&mut self) {}

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Pick the progress display for this invocation.
pub(crate) fn sink(cli: &Cli) -> Box<dyn Progress> {
    if cli.quiet {
        Box::new(NoProgress)
    } else if cli.plain || !use_fancy_output() {
        Box::new(HashMarks::new(io::stderr()))
    } else {
        Box::new(Bar::new())
    }
}
