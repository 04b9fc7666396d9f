//! Progress display for CLI operations.

use indicatif::{ProgressBar, ProgressStyle};

use jarwright::{Result, Transformer, VirtualArchive};

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Progress bar over the steps of a transformer chain
pub struct ChainProgress {
    bar: ProgressBar,
}

impl ChainProgress {
    /// Creates a progress bar for `steps` transformers
    pub fn new(steps: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(steps as u64);
            pb.set_style(bar_style());
            pb
        };
        Self { bar }
    }

    /// Wraps each transformer so the bar follows the chain
    pub fn track(&self, chain: Vec<Box<dyn Transformer>>) -> Vec<Tracked> {
        chain
            .into_iter()
            .map(|inner| Tracked {
                inner,
                bar: self.bar.clone(),
            })
            .collect()
    }

    /// Finishes the progress bar
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Finishes with a message, leaving the bar visible
    pub fn abandon(&self, msg: impl Into<String>) {
        self.bar.abandon_with_message(msg.into());
    }
}

/// A transformer that reports to a [`ChainProgress`] bar
pub struct Tracked {
    inner: Box<dyn Transformer>,
    bar: ProgressBar,
}

impl Transformer for Tracked {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()> {
        self.bar.set_message(self.inner.name().to_string());
        self.inner.transform(archive)?;
        self.bar.inc(1);
        Ok(())
    }
}

/// Spinner over the inputs of a merge
pub struct MergeProgress {
    bar: ProgressBar,
}

impl MergeProgress {
    /// Creates a spinner for merging `inputs` jars
    pub fn new(inputs: usize, quiet: bool) -> Self {
        if quiet {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Merging {} jars...", inputs));
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }

    /// Finishes the spinner
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Finishes with a custom message
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.bar.finish_with_message(msg.into());
    }
}
